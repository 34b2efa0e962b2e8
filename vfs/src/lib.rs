#![cfg_attr(not(test), no_std)]

mod error;
mod flag;
mod stat;

pub use self::{
    error::Error,
    flag::{OpenFlag, Whence},
    stat::{InodeType, Stat},
};
