//! Integration tests for types

#[cfg(test)]
mod tests {
    use abroot_types::*;

    #[test]
    fn test_slot_serialization() {
        let json = serde_json::to_string(&SlotId::B).unwrap();
        assert_eq!(json, r#""b""#);

        let deserialized: SlotId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, SlotId::B);
    }

    #[test]
    fn test_abimage_json_shape() {
        let image = ABImage::new("sha256:abc", "ghcr.io/vanilla-os/desktop:main");
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["digest"], "sha256:abc");
        assert_eq!(value["image"], "ghcr.io/vanilla-os/desktop:main");
        assert!(value["timestamp"].is_string());
        assert!(image.is_complete());
    }

    #[test]
    fn test_incomplete_abimage() {
        let image = ABImage::new("", "ghcr.io/vanilla-os/desktop:main");
        assert!(!image.is_complete());
    }

    #[test]
    fn test_empty_diff() {
        let mut diff = PackageDiff::default();
        assert!(diff.is_empty());
        diff.removed.push(PackageChange {
            name: "nano".into(),
            previous_version: Some("7.2".into()),
            new_version: None,
        });
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Tty);
    }
}
