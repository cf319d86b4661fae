#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Block device model for the two-slot root layout
//!
//! Partitions are rebuilt from `lsblk` on every query and stored in a flat
//! arena; device-mapper children point at their parent by index. Mount and
//! recursive unmount go through the platform layer.

mod lsblk;
pub mod model;
pub mod mounts;
pub mod partition;
pub mod roots;

pub use lsblk::parse_lsblk;
pub use model::DiskModel;
pub use mounts::{
    is_mount_point, parse_mountinfo, read_mount_table, unmount_order, unmount_tree, MountRecord,
    MAX_MOUNT_DEPTH,
};
pub use partition::{Partition, PartitionTable};
pub use roots::{resolve_roots, RootPair, SlotPartition};
