//! A single-machine, multi-process MapReduce coordination engine: task
//! dispatch, progress tracking, watchdog-driven recovery, and the
//! shuffle/partition contract tying map outputs to reduce inputs. The
//! map/reduce functions themselves, and the binaries that drive the
//! coordinator and worker processes, live outside this library crate.

pub mod mr;
