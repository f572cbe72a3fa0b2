pub mod init;
pub mod pathway;
pub mod simulate;
pub mod validate;
