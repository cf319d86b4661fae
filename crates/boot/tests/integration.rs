use abroot_boot::{
    discover_kernel, publish_menu, render_menu, render_slot_entry, write_slot_entry,
    BootStateResolver, MenuSlot,
};
use abroot_errors::{BootError, Error};
use abroot_events::{AppEvent, BootEvent};
use abroot_types::SlotId;
use tempfile::TempDir;

fn menu_slot(slot: SlotId) -> MenuSlot {
    MenuSlot {
        slot,
        uuid: format!("uuid-{}", slot.identifier()),
        config_path: "/.system/boot/grub/abroot.cfg".to_string(),
    }
}

#[tokio::test]
async fn published_menu_resolves_to_the_new_default() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("grub/grub.cfg");
    let (tx, mut rx) = abroot_events::channel();

    publish_menu(
        &path,
        &render_menu(&menu_slot(SlotId::A), &menu_slot(SlotId::B)),
        SlotId::A,
        Some(&tx),
    )
    .await
    .unwrap();
    let resolver = BootStateResolver::new(&path, Some(tx.clone()));
    let state = resolver.resolve().await.unwrap();
    assert_eq!((state.present, state.future), (SlotId::A, SlotId::B));

    // Upgrading into B flips the default and keeps A as the fallback
    publish_menu(
        &path,
        &render_menu(&menu_slot(SlotId::B), &menu_slot(SlotId::A)),
        SlotId::B,
        Some(&tx),
    )
    .await
    .unwrap();
    let state = resolver.resolve().await.unwrap();
    assert_eq!((state.present, state.future), (SlotId::B, SlotId::A));
    assert!(!resolver.is_booted_into_present_root(SlotId::B).await.unwrap());
    assert!(resolver.is_booted_into_present_root(SlotId::A).await.unwrap());

    drop(tx);
    drop(resolver);
    let mut published = 0;
    let mut resolved = 0;
    while let Some(event) = rx.recv().await {
        match event {
            AppEvent::Boot(BootEvent::MenuPublished { .. }) => published += 1,
            AppEvent::Boot(BootEvent::StateResolved { .. }) => resolved += 1,
            _ => {}
        }
    }
    assert_eq!(published, 2);
    assert_eq!(resolved, 4);
}

#[tokio::test]
async fn missing_config_is_unreadable() {
    let temp = TempDir::new().unwrap();
    let resolver = BootStateResolver::new(temp.path().join("grub.cfg"), None);
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Boot(BootError::ConfigUnreadable { .. })
    ));
}

#[tokio::test]
async fn slot_entry_replaces_previous_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".system/boot/grub/abroot.cfg");

    write_slot_entry(&path, "old\n", SlotId::B, None).await.unwrap();
    let entry = render_slot_entry("6.1.0", "uuid-b", "vos-b", "quiet");
    write_slot_entry(&path, &entry, SlotId::B, None).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), entry);
}

#[tokio::test]
async fn newest_kernel_is_selected() {
    let temp = TempDir::new().unwrap();
    let boot = temp.path().join(".system/boot");
    std::fs::create_dir_all(&boot).unwrap();
    for name in [
        "vmlinuz-6.1.0-9-amd64",
        "vmlinuz-6.1.0-13-amd64",
        "initrd.img-6.1.0-13-amd64",
        "config-7.0.0",
    ] {
        std::fs::write(boot.join(name), b"").unwrap();
    }

    assert_eq!(discover_kernel(temp.path()).await.unwrap(), "6.1.0-13-amd64");
}

#[tokio::test]
async fn slot_without_kernel_is_rejected() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".system/boot")).unwrap();
    let err = discover_kernel(temp.path()).await.unwrap_err();
    assert!(matches!(err, Error::Boot(BootError::KernelNotFound { .. })));
}
