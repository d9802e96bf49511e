pub mod foundation;
pub mod subscription;
