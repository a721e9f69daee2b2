pub mod config;
pub mod feedback;
pub mod pose;
pub mod reference;
pub mod runner;
pub mod scoring;
pub mod session;
pub mod source;
pub mod timing;
