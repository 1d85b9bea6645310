pub mod payments;
pub mod root;
pub mod webhook;
