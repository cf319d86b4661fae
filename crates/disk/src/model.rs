//! Live disk queries and mount management

use abroot_config::PartitionsConfig;
use abroot_errors::{DiskError, Error};
use abroot_events::{AppEvent, DiskEvent, EventEmitter, EventSender};
use abroot_platform::{MountRequest, Platform, PlatformContext};
use std::path::Path;

use crate::lsblk::{parse_lsblk, LSBLK_COLUMNS};
use crate::mounts::unmount_tree;
use crate::partition::{Partition, PartitionTable};
use crate::roots::{resolve_roots, RootPair};

/// Block device model bound to the slot labels of one installation
pub struct DiskModel {
    platform: Platform,
    ctx: PlatformContext,
    labels: PartitionsConfig,
    event_sender: Option<EventSender>,
}

impl EventEmitter for DiskModel {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl DiskModel {
    #[must_use]
    pub fn new(labels: PartitionsConfig, event_sender: Option<EventSender>) -> Self {
        let platform = Platform::current();
        let ctx = platform.create_context(event_sender.clone());
        Self {
            platform,
            ctx,
            labels,
            event_sender,
        }
    }

    #[must_use]
    pub fn labels(&self) -> &PartitionsConfig {
        &self.labels
    }

    /// Enumerate partitions of every disk, or of the top-level disk `filter`
    ///
    /// # Errors
    ///
    /// Returns `DiskError::EnumerationFailed` when `lsblk` cannot run or
    /// exits non-zero, and `DiskError::InvalidListing` for undecodable output.
    pub async fn get_partitions(&self, filter: &str) -> Result<PartitionTable, Error> {
        let mut cmd = self.platform.command("lsblk");
        cmd.args(["-J", "-o", LSBLK_COLUMNS]);

        let output = self
            .platform
            .process()
            .execute_command(&self.ctx, cmd)
            .await
            .map_err(|e| DiskError::EnumerationFailed {
                message: e.to_string(),
            })?;
        if !output.success() {
            return Err(DiskError::EnumerationFailed {
                message: output.stderr_string(),
            }
            .into());
        }

        let table = parse_lsblk(&output.stdout, filter)?;
        self.emit(AppEvent::Disk(DiskEvent::PartitionsEnumerated {
            filter: (!filter.is_empty()).then(|| filter.to_string()),
            count: table.len(),
        }));
        Ok(table)
    }

    /// First partition carrying `label`
    ///
    /// # Errors
    ///
    /// Returns `DiskError::LabelNotFound` when no partition matches.
    pub async fn get_partition_by_label(&self, label: &str) -> Result<Partition, Error> {
        let table = self.get_partitions("").await?;
        table.by_label(label).cloned().ok_or_else(|| {
            DiskError::LabelNotFound {
                label: label.to_string(),
            }
            .into()
        })
    }

    /// Classify both slots relative to the running system
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration fails or the slots cannot be classified.
    pub async fn roots(&self) -> Result<RootPair, Error> {
        let table = self.get_partitions("").await?;
        let pair = resolve_roots(&table, &self.labels, Path::new("/"))?;
        self.emit(AppEvent::Disk(DiskEvent::RootsResolved {
            present_label: pair.present.label.clone(),
            future_label: pair.future.label.clone(),
        }));
        Ok(pair)
    }

    /// The slot the system is booted from
    ///
    /// # Errors
    ///
    /// See [`DiskModel::roots`].
    pub async fn present_root(&self) -> Result<crate::SlotPartition, Error> {
        Ok(self.roots().await?.present)
    }

    /// The slot staged for the next boot
    ///
    /// # Errors
    ///
    /// See [`DiskModel::roots`].
    pub async fn future_root(&self) -> Result<crate::SlotPartition, Error> {
        Ok(self.roots().await?.future)
    }

    /// Mount `partition` at `destination`, creating the directory if needed
    ///
    /// Mounting over an existing mount is a caller error and is not checked.
    ///
    /// # Errors
    ///
    /// Returns `DiskError::MountFailed` if the directory cannot be created or
    /// the mount is refused.
    pub async fn mount(
        &self,
        partition: &mut Partition,
        destination: &Path,
        options: Option<&str>,
    ) -> Result<(), Error> {
        let mount_failed = |message: String| DiskError::MountFailed {
            device: partition.device.display().to_string(),
            destination: destination.display().to_string(),
            message,
        };

        self.platform
            .filesystem()
            .create_dir_all(&self.ctx, destination)
            .await
            .map_err(|e| mount_failed(e.to_string()))?;

        let mut request =
            MountRequest::device(partition.device.display().to_string(), destination);
        if !partition.fs_type.is_empty() && !partition.is_encrypted() {
            request = request.with_fstype(partition.fs_type.clone());
        }
        if let Some(options) = options.filter(|o| !o.is_empty()) {
            request = request.with_data(options);
        }

        self.platform
            .mount()
            .mount(&self.ctx, request)
            .await
            .map_err(|e| mount_failed(e.to_string()))?;

        partition.mount_point = Some(destination.to_path_buf());
        partition.mount_options = options.unwrap_or_default().to_string();
        self.emit(AppEvent::Disk(DiskEvent::Mounted {
            device: partition.device.display().to_string(),
            destination: destination.display().to_string(),
        }));
        Ok(())
    }

    /// Unmount `mount_point` and everything mounted beneath it, children first
    ///
    /// Returns the number of unmounts performed.
    ///
    /// # Errors
    ///
    /// Returns `DiskError::UnmountFailed` on the first refused unmount and
    /// `DiskError::MountChainTooDeep` for a corrupted mount table.
    pub async fn unmount_recursive(&self, mount_point: &Path, detach: bool) -> Result<usize, Error> {
        let mounts = unmount_tree(&self.platform, &self.ctx, mount_point, detach).await?;
        self.emit(AppEvent::Disk(DiskEvent::Unmounted {
            mount_point: mount_point.display().to_string(),
            mounts,
        }));
        Ok(mounts)
    }
}
