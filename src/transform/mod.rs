//! The two series transformations.
//!
//! [`regularize`](regularize::regularize) snaps raw observations onto the grid
//! of their declared step, and [`aggregate`](aggregate::aggregate) summarises a
//! regular series into a coarser step while tracking missing source values.
//! Both are pure: they borrow their input and return a new series.

pub mod aggregate;
pub mod grid;
pub mod method;
pub mod regularize;
