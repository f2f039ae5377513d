//! Concrete task definitions.

pub mod register;

pub use register::{submit_registration, RegisterUser, RegisterUserHandler};
