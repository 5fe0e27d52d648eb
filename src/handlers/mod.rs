//! HTTP 处理器模块

pub mod excel;
pub mod health;
