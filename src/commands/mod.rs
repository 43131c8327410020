pub mod configure;
pub mod sync;
pub mod validate;
