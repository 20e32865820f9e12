pub mod audio;
pub mod cache;
pub mod converter;
pub mod invoker;
pub mod mixer;
pub mod worker;
