pub mod copy;
pub mod file;
pub mod proc;
pub mod xattr;
