pub mod protocol;
pub mod reconciler;
pub mod remote;
