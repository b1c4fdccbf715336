// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for shmtoken.
//!
//! These tests exercise regions across several handles in one process, which
//! share the OS objects exactly as separate processes would.

use shmtoken_core::{
    AccessMode, ConfigLoader, CreateFlags, OpenOutcome, OpenToken, SharedMemory, ShmError,
};
use tempfile::TempDir;

fn test_name(tag: &str) -> String {
    format!("shmtoken-it-{}-{}", tag, std::process::id())
}

/// Token round-trip through base64 into a second handle
#[test]
fn test_token_roundtrip_shares_bytes() {
    let mut owner = SharedMemory::new();
    owner
        .create(&test_name("roundtrip"), 8192, CreateFlags::MAKE_UNIQUE)
        .expect("Failed to create region");

    let mut writer = owner
        .create_view(0, 0, AccessMode::Default)
        .expect("Failed to map view");
    writer.write_at(100, b"hello across handles").unwrap();

    let encoded = owner.get_open_token().base64().unwrap().to_string();
    let token = OpenToken::from_base64(&encoded);
    assert_eq!(token, owner.get_open_token());
    assert_eq!(token.region_size(), Some(owner.size()));
    assert_eq!(token.name(), owner.name());

    let mut peer = SharedMemory::new();
    peer.open_token(&token, AccessMode::Default)
        .expect("Failed to open from token");
    assert_eq!(peer.size(), owner.size());
    assert_eq!(peer.access_mode(), AccessMode::ReadWrite);

    let reader = peer.create_view(0, 0, AccessMode::ReadOnly).unwrap();
    let mut buf = [0u8; 20];
    reader.read_at(100, &mut buf).unwrap();
    assert_eq!(&buf, b"hello across handles");
}

/// The region outlives the creator while another handle holds it open
#[cfg(unix)]
#[test]
fn test_region_lives_until_last_close() {
    let mut creator = SharedMemory::new();
    creator
        .create(&test_name("refcount"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();
    let token = creator.get_open_token();

    let mut second = SharedMemory::new();
    second.open_token(&token, AccessMode::ReadWrite).unwrap();

    creator.close(false);
    assert!(!creator.is_open());

    let mut third = SharedMemory::new();
    third
        .open_token(&token, AccessMode::ReadOnly)
        .expect("Region should stay openable while a handle is open");
    third.close(false);
    second.close(false);

    let mut late = SharedMemory::new();
    let result = late.open_token(&token, AccessMode::ReadOnly);
    assert!(matches!(result, Err(ShmError::NotFound { .. })));
}

/// Forced unlink removes the name even while other handles are open
#[cfg(unix)]
#[test]
fn test_force_unlink() {
    let mut creator = SharedMemory::new();
    creator
        .create(&test_name("force"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();
    let token = creator.get_open_token();

    let mut other = SharedMemory::new();
    other.open_token(&token, AccessMode::ReadWrite).unwrap();
    let mut view = other.create_view(0, 0, AccessMode::Default).unwrap();

    creator.close(true);

    let mut late = SharedMemory::new();
    assert!(late.open_token(&token, AccessMode::ReadOnly).is_err());

    // Existing mappings are unaffected.
    view.write_at(0, &[7]).unwrap();
    other.close(false);
}

/// Views stay valid after the handle that created them closes
#[test]
fn test_view_survives_close() {
    let mut shm = SharedMemory::new();
    shm.create(&test_name("survive"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();
    let mut view = shm.create_view(0, 0, AccessMode::Default).unwrap();
    shm.close(false);

    view.write_at(0, b"still here").unwrap();
    let mut buf = [0u8; 10];
    view.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"still here");

    view.unmap();
    assert!(view.address().is_null());
    assert_eq!(view.size(), 0);
    assert!(matches!(view.read_at(0, &mut buf), Err(ShmError::Unmapped)));
    view.unmap();
}

/// Writes through a view whose handle closed are seen by handles still open
#[test]
fn test_view_after_close_shares_with_peer() {
    let mut owner = SharedMemory::new();
    owner
        .create(&test_name("afterclose"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();
    let mut peer = SharedMemory::new();
    peer.open_token(&owner.get_open_token(), AccessMode::ReadOnly)
        .unwrap();

    let mut view = owner.create_view(0, 0, AccessMode::Default).unwrap();
    owner.close(false);
    view.write_at(64, b"after close").unwrap();

    let reader = peer.create_view(0, 0, AccessMode::ReadOnly).unwrap();
    let mut buf = [0u8; 11];
    reader.read_at(64, &mut buf).unwrap();
    assert_eq!(&buf, b"after close");
}

/// Unaligned view offsets report the page-aligned offset but address the requested byte
#[test]
fn test_view_alignment() {
    let mut shm = SharedMemory::new();
    let page = shm.system_page_size();
    shm.create(&test_name("align"), page * 3, CreateFlags::MAKE_UNIQUE)
        .unwrap();

    let mut whole = shm.create_view(0, 0, AccessMode::Default).unwrap();
    let target = page + 123;
    whole.write_at(target, &[0xAB, 0xCD]).unwrap();

    let view = shm.create_view(target, 16, AccessMode::ReadOnly).unwrap();
    assert_eq!(view.offset(), page);
    assert_eq!(view.size(), 16);
    assert_eq!(view.access_mode(), AccessMode::ReadOnly);

    // SAFETY: nothing writes the range while the slice is alive
    let bytes = unsafe { view.as_slice() };
    assert_eq!(&bytes[..2], &[0xAB, 0xCD]);
}

/// Zero and oversized view sizes clamp to the end of the region
#[test]
fn test_view_size_clamping() {
    let mut shm = SharedMemory::new();
    let page = shm.system_page_size();
    shm.create(&test_name("clamp"), page * 2, CreateFlags::MAKE_UNIQUE)
        .unwrap();

    let rest = shm.create_view(page, 0, AccessMode::Default).unwrap();
    assert_eq!(rest.size(), page);

    let clamped = shm.create_view(10, page * 10, AccessMode::Default).unwrap();
    assert_eq!(clamped.size(), page * 2 - 10);

    let mut view = shm.create_view(0, 8, AccessMode::Default).unwrap();
    assert!(matches!(
        view.write_at(4, &[0; 8]),
        Err(ShmError::ViewBounds { .. })
    ));
}

/// Creating an existing name fails; create_or_open opens it instead
#[test]
fn test_exclusive_create_conflict() {
    let name = test_name("exclusive");

    let mut first = SharedMemory::new();
    let outcome = first
        .create_or_open(&name, 4096, CreateFlags::empty())
        .unwrap();
    assert_eq!(outcome, OpenOutcome::Created);

    let mut second = SharedMemory::new();
    let result = second.create(&name, 4096, CreateFlags::QUIET);
    assert!(matches!(result, Err(ShmError::AlreadyExists { .. })));
    assert!(!second.is_open());

    let outcome = second
        .create_or_open(&name, 4096, CreateFlags::empty())
        .unwrap();
    assert_eq!(outcome, OpenOutcome::Opened);

    let mut third = SharedMemory::new();
    third.open(&name, 4096, CreateFlags::empty()).unwrap();
    assert_eq!(third.get_open_token(), first.get_open_token());

    third.close(false);
    second.close(false);
    first.close(false);
}

/// Opening a name that does not exist fails without creating it
#[test]
fn test_open_missing_name() {
    let mut shm = SharedMemory::new();
    let result = shm.open(&test_name("missing"), 4096, CreateFlags::QUIET);
    assert!(matches!(result, Err(ShmError::NotFound { .. })));
    assert!(!shm.is_open());
}

/// Unique names never collide with an existing region of the same base name
#[test]
fn test_make_unique_decorates_name() {
    let base = test_name("unique");
    let mut a = SharedMemory::new();
    let mut b = SharedMemory::new();
    a.create(&base, 4096, CreateFlags::MAKE_UNIQUE).unwrap();
    b.create(&base, 4096, CreateFlags::MAKE_UNIQUE).unwrap();

    let a_name = a.name().unwrap().to_string();
    let b_name = b.name().unwrap().to_string();
    assert!(a_name.starts_with(&base));
    assert!(b_name.starts_with(&base));
    assert_ne!(a_name, b_name);
}

/// A read-only open refuses writable views and writes
#[test]
fn test_read_only_containment() {
    let mut owner = SharedMemory::new();
    owner
        .create(&test_name("readonly"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();

    let mut reader = SharedMemory::new();
    reader
        .open_token(&owner.get_open_token(), AccessMode::ReadOnly)
        .unwrap();
    assert_eq!(reader.access_mode(), AccessMode::ReadOnly);

    let result = reader.create_view(0, 0, AccessMode::ReadWrite);
    assert!(matches!(
        result,
        Err(ShmError::AccessDenied {
            requested: AccessMode::ReadWrite,
            granted: AccessMode::ReadOnly
        })
    ));

    let explicit = reader.create_view(0, 0, AccessMode::ReadOnly).unwrap();
    assert_eq!(explicit.access_mode(), AccessMode::ReadOnly);
    assert_eq!(explicit.size(), reader.size());

    let mut view = reader.create_view(0, 0, AccessMode::Default).unwrap();
    assert_eq!(view.access_mode(), AccessMode::ReadOnly);
    assert!(matches!(
        view.write_at(0, b"x"),
        Err(ShmError::AccessDenied { .. })
    ));
}

/// Opening an existing region with a larger size grows it on POSIX
#[cfg(unix)]
#[test]
fn test_open_larger_grows_region() {
    let name = test_name("grow");
    let mut small = SharedMemory::new();
    let page = small.system_page_size();
    small.create(&name, page, CreateFlags::empty()).unwrap();

    let mut large = SharedMemory::new();
    large.open(&name, page * 4, CreateFlags::empty()).unwrap();
    assert_eq!(large.size(), page * 4);

    let mut view = large.create_view(page * 3, 0, AccessMode::Default).unwrap();
    view.write_at(0, b"tail").unwrap();

    large.close(false);
    small.close(false);
}

/// Opening an existing section with a larger size fails on Windows
#[cfg(windows)]
#[test]
fn test_open_larger_rejected() {
    let name = test_name("grow");
    let mut small = SharedMemory::new();
    let page = small.system_page_size();
    small.create(&name, page, CreateFlags::empty()).unwrap();

    let mut large = SharedMemory::new();
    let result = large.open(&name, page * 4, CreateFlags::QUIET);
    assert!(matches!(result, Err(ShmError::SizeMismatch { .. })));
}

/// Handles built from a config file honor its settings
#[test]
fn test_config_file_drives_handle() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("shmtoken.yaml");
    std::fs::write(
        &config_path,
        r#"
shm:
  lock_warn_timeout_ms: 1000
  quiet: true
defaults:
  region_size: 16384
  make_unique: true
"#,
    )
    .expect("Failed to write config");

    let config = ConfigLoader::load_file(&config_path).expect("Failed to load config");
    assert!(config.shm.quiet);

    let mut shm = SharedMemory::with_config(&config.shm);
    let flags = if config.defaults.make_unique {
        CreateFlags::MAKE_UNIQUE
    } else {
        CreateFlags::empty()
    };
    shm.create(&test_name("config"), config.defaults.region_size, flags)
        .unwrap();
    assert_eq!(shm.size(), 16384);
}

/// Invalid config files are rejected with a field-specific error
#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("bad.yaml");
    std::fs::write(&config_path, "defaults:\n  region_size: 0\n").expect("Failed to write config");

    let result = ConfigLoader::load_file(&config_path);
    assert!(result.is_err());

    let missing = ConfigLoader::load_file(temp_dir.path().join("absent.yaml"));
    assert!(missing.is_err());
}

/// Handles and views can move to other threads
#[test]
fn test_handles_are_send() {
    let mut shm = SharedMemory::new();
    shm.create(&test_name("send"), 4096, CreateFlags::MAKE_UNIQUE)
        .unwrap();
    let mut view = shm.create_view(0, 0, AccessMode::Default).unwrap();

    let handle = std::thread::spawn(move || {
        view.write_at(0, &[42]).unwrap();
        view
    });
    let view = handle.join().unwrap();

    let mut buf = [0u8; 1];
    view.read_at(0, &mut buf).unwrap();
    assert_eq!(buf[0], 42);
    drop(shm);
}

/// A token outliving its region does not open a smaller region reusing the name
#[test]
fn test_stale_token_rejects_smaller_region() {
    let name = test_name("stale-token");
    let mut original = SharedMemory::new();
    let page = original.system_page_size();
    original.create(&name, page * 2, CreateFlags::empty()).unwrap();
    let token = original.get_open_token();
    original.close(true);

    let mut replacement = SharedMemory::new();
    replacement.create(&name, page, CreateFlags::empty()).unwrap();

    let mut reader = SharedMemory::new();
    let result = reader.open_token(&token, AccessMode::ReadOnly);
    assert!(matches!(
        result,
        Err(ShmError::SizeMismatch { existing, requested, .. })
            if existing == page && requested == page * 2
    ));
    assert!(!reader.is_open());

    // The failed open gave its reference back: the replacement is still the
    // only holder and unlinks the region on close.
    replacement.close(false);
    let mut late = SharedMemory::new();
    assert!(late.open(&name, page, CreateFlags::QUIET).is_err());
}

/// A reference count leaked by crashed holders is reset when its region is recreated
#[cfg(unix)]
#[test]
fn test_stale_reference_count_recovered() {
    let name = test_name("stale-count");
    let mut creator = SharedMemory::new();
    creator.create(&name, 4096, CreateFlags::empty()).unwrap();

    // Two holders vanish without closing, leaving the count at 2.
    for _ in 0..2 {
        let mut holder = SharedMemory::new();
        holder.open(&name, 4096, CreateFlags::empty()).unwrap();
        std::mem::forget(holder);
    }
    creator.close(false);

    // Remove only the segment, leaving the count behind.
    let segment = std::ffi::CString::new(format!("/{}", name)).unwrap();
    // SAFETY: segment is a valid NUL-terminated string
    assert_eq!(unsafe { libc::shm_unlink(segment.as_ptr()) }, 0);

    let mut fresh = SharedMemory::new();
    let outcome = fresh
        .create_or_open(&name, 4096, CreateFlags::empty())
        .unwrap();
    assert_eq!(outcome, OpenOutcome::Created);
    fresh.close(false);

    let mut late = SharedMemory::new();
    let result = late.open(&name, 4096, CreateFlags::QUIET);
    assert!(matches!(result, Err(ShmError::NotFound { .. })));
}

/// Callers that serialize creation themselves can skip the creation mutex
#[test]
fn test_no_mutex_lock_roundtrip() {
    let name = test_name("nolock");
    let flags = CreateFlags::NO_MUTEX_LOCK;

    let mut first = SharedMemory::new();
    assert_eq!(
        first.create_or_open(&name, 4096, flags).unwrap(),
        OpenOutcome::Created
    );
    let mut second = SharedMemory::new();
    assert_eq!(
        second.create_or_open(&name, 4096, flags).unwrap(),
        OpenOutcome::Opened
    );
    let mut third = SharedMemory::new();
    third
        .open_token(&first.get_open_token(), AccessMode::Default)
        .unwrap();

    let mut view = first.create_view(0, 0, AccessMode::Default).unwrap();
    view.write_at(0, b"unlocked").unwrap();
    let mut buf = [0u8; 8];
    third
        .create_view(0, 8, AccessMode::ReadOnly)
        .unwrap()
        .read_at(0, &mut buf)
        .unwrap();
    assert_eq!(&buf, b"unlocked");

    third.close(false);
    second.close(false);
    first.close(false);

    let mut late = SharedMemory::new();
    assert!(late.open(&name, 4096, flags | CreateFlags::QUIET).is_err());
}
