/**
 * Routes Module
 * API route handlers
 */

pub mod articles;
pub mod health;
pub mod pages;
pub mod upload;
