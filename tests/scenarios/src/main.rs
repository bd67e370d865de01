fn main() {
    println!("Run `cargo test -p stowage-scenarios` to execute the end-to-end scenarios.");
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use stowage_file_ops::{RelocateRequest, delete_all, list_children, list_directory};
    use stowage_orchestrator::{TransferSettings, UploadCoordinator, UploadMode};
    use stowage_protocol::memory::{Call, MemoryStore};
    use stowage_protocol::{Charset, Session, UploadStatus};
    use stowage_transfer::FragmentSet;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn write_local(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn keep_open() -> TransferSettings {
        TransferSettings {
            close_session_after_upload: false,
            ..TransferSettings::default()
        }
    }

    /// Fragments land in staging, get merged, fanned out, then cleaned up.
    #[test]
    fn chunked_asset_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let coordinator = UploadCoordinator::new(keep_open());
        let mut session = coordinator.settings().session(store.session());

        let archive = pattern(3000, 7);
        let mut fragment_names = Vec::new();
        for (idx, part) in archive.chunks(1100).enumerate() {
            let name = format!("asset1.zip.{idx}");
            let local = write_local(tmp.path(), &name, part);
            let report = coordinator
                .upload(&mut session, &local, &format!("/staging/{name}"))
                .unwrap();
            assert_eq!(report.mode, UploadMode::Full);
            fragment_names.push(name);
        }
        let image = write_local(tmp.path(), "asset1.jpg", b"jpeg bytes");
        coordinator
            .upload(&mut session, &image, "/staging/asset1.jpg")
            .unwrap();
        let thumb = write_local(tmp.path(), "thum&asset1.png", b"png bytes");
        coordinator
            .upload(&mut session, &thumb, "/staging/thum&asset1.png")
            .unwrap();

        let merged = coordinator
            .merge(
                &mut session,
                "/staging/asset1.zip",
                &FragmentSet::new(fragment_names, 3000),
            )
            .unwrap();
        assert_eq!(merged, 3000);
        assert_eq!(store.file("/staging/asset1.zip").unwrap(), archive);

        let relocated = coordinator
            .relocate(
                &mut session,
                &RelocateRequest {
                    staging_dir: "/staging",
                    base_name: "asset1",
                    picture_dest: "/library/pictures",
                    file_dest: "/library/files",
                    is_picture: false,
                },
            )
            .unwrap();
        assert_eq!(relocated.copied.len(), 2);
        assert_eq!(store.file("/library/files/asset1.zip").unwrap(), archive);
        assert_eq!(
            store.file("/library/pictures/asset1.jpg").unwrap(),
            b"jpeg bytes"
        );

        let leftovers = list_children(&mut session, "/staging").unwrap();
        assert_eq!(leftovers.len(), 6);
        let cleanup = delete_all(&mut session, &["/staging".to_string()], &leftovers).unwrap();
        assert!(cleanup.is_clean());
        assert!(!store.has_dir("/staging"));
        assert!(store.file("/library/files/asset1.zip").is_some());
    }

    /// A transfer cut off in one session is resumed by the next.
    #[test]
    fn interrupted_upload_resumes_in_a_new_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let data = pattern(8000, 1);
        let local = write_local(tmp.path(), "video.mp4", &data);
        let coordinator = UploadCoordinator::new(TransferSettings::default());

        store.fail_next_write_after(3072);
        let first = coordinator
            .upload(&mut Session::new(store.session()), &local, "/media/video.mp4")
            .unwrap_err();
        assert_eq!(first.status(), UploadStatus::TransferFailed);
        assert_eq!(store.file("/media/video.mp4").unwrap().len(), 3072);

        let second = coordinator
            .upload(&mut Session::new(store.session()), &local, "/media/video.mp4")
            .unwrap();
        assert_eq!(second.mode, UploadMode::Resumed { offset: 3072 });
        assert_eq!(store.file("/media/video.mp4").unwrap(), data);

        // A third run finds the object complete.
        let third = coordinator
            .upload(&mut Session::new(store.session()), &local, "/media/video.mp4")
            .unwrap();
        assert_eq!(third.mode, UploadMode::AlreadyComplete);
        assert_eq!(store.count_calls(|c| *c == Call::Logout), 3);
    }

    /// A configured Latin-1 fallback sends accented names one byte per char.
    #[test]
    fn latin1_fallback_keeps_accented_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.refuse_utf8();
        let local = write_local(tmp.path(), "plain.bin", b"contenu");
        let coordinator = UploadCoordinator::new(TransferSettings {
            fallback_charset: Charset::Latin1,
            ..TransferSettings::default()
        });

        coordinator
            .upload(
                &mut coordinator.settings().session(store.session()),
                &local,
                "/médias/été.bin",
            )
            .unwrap();
        assert_eq!(store.file("/médias/été.bin").unwrap(), b"contenu");
    }

    /// Without UTF-8 support CJK names travel as GBK and stay browsable.
    #[test]
    fn gbk_fallback_lists_and_skips_cjk_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.refuse_utf8();
        let data = pattern(1500, 5);
        let local = write_local(tmp.path(), "cover.png", &data);
        let coordinator = UploadCoordinator::new(keep_open());
        let mut session = coordinator.settings().session(store.session());

        for target in ["/相册/封面.png", "/相册/资料.png", "/相册/封面.png"] {
            coordinator.upload(&mut session, &local, target).unwrap();
        }
        assert_eq!(store.count_calls(|c| matches!(c, Call::Store(_) | Call::Append(_))), 2);

        let mut names: Vec<String> = list_directory(&mut session, "/相册")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        let mut expected = vec!["封面.png".to_string(), "资料.png".to_string()];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn report_and_status_json_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let data = pattern(500, 3);
        store.add_file("/d/f.bin", &data[..200]);
        let local = write_local(tmp.path(), "f.bin", &data);
        let coordinator = UploadCoordinator::new(TransferSettings::default());

        let report = coordinator
            .upload(&mut Session::new(store.session()), &local, "/d/f.bin")
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["remotePath"], "/d/f.bin");
        assert_eq!(json["mode"]["kind"], "resumed");
        assert_eq!(json["mode"]["offset"], 200);
        assert_eq!(json["localSize"], 500);
        assert_eq!(json["bytesSent"], 300);

        let status = serde_json::to_value(UploadStatus::RemoteLargerThanLocal).unwrap();
        assert_eq!(status, "remote_larger_than_local");
    }

    /// Independent sessions upload concurrently through one coordinator.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_spawned_uploads() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let a = pattern(4096, 9);
        let b = pattern(2048, 4);
        let local_a = write_local(tmp.path(), "a.bin", &a);
        let local_b = write_local(tmp.path(), "b.bin", &b);
        let coordinator = Arc::new(UploadCoordinator::new(TransferSettings::default()));

        let first = coordinator.spawn_upload(
            Session::new(store.session()),
            local_a,
            "/shared/a.bin".into(),
        );
        let second = coordinator.spawn_upload(
            Session::new(store.session()),
            local_b,
            "/shared/b.bin".into(),
        );
        let (first, second) = tokio::join!(first, second);

        assert!(first.unwrap().1.is_ok());
        assert!(second.unwrap().1.is_ok());
        assert_eq!(store.file("/shared/a.bin").unwrap(), a);
        assert_eq!(store.file("/shared/b.bin").unwrap(), b);
    }
}
