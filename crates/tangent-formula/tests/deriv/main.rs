//! End-to-end tests for differentiating workbook cells.
//!
//! Each test builds the small workbook it needs, differentiates one formula
//! cell with respect to another and checks the rendered result, its value at
//! the current cell values, or both.

mod common;
mod cross_cell;
mod properties;
mod rules;

pub use common::*;
