use std::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Granted,
    Denied,
}

/// Microphone-access collaborator. `request` resolves asynchronously: the
/// platform glue delivers the user's decision on the returned channel.
pub trait PermissionGate: Send {
    fn is_granted(&self) -> bool;
    fn request(&mut self) -> mpsc::Receiver<PermissionDecision>;
}

/// Desktop gate: hosts surface their own consent prompt when the input
/// stream is opened, so the app-level check always passes.
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn is_granted(&self) -> bool {
        true
    }

    fn request(&mut self) -> mpsc::Receiver<PermissionDecision> {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(PermissionDecision::Granted);
        rx
    }
}
