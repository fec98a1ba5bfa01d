pub mod configure;
pub mod services;
