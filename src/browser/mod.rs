pub mod download;
pub mod navigation;
pub mod resolve;
pub mod session;
