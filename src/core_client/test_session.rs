// Session behaviour against the in-memory engine

#[cfg(test)]
mod tests {
    use crate::core_client::{ErrorKind, FtpError, FtpSession, OptionValue};
    use crate::core_engine::{MemoryEngine, TransferMode};
    use std::fs;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    fn connected(engine: MemoryEngine) -> FtpSession<MemoryEngine> {
        let mut session = FtpSession::with_engine(engine);
        session
            .connect("ftp.example.com", false, 21, 30)
            .unwrap()
            .login("user", "pw")
            .unwrap();
        session
    }

    #[test]
    fn test_operations_before_connect_fail() {
        let mut session = FtpSession::with_engine(MemoryEngine::new());
        let mut sink: Vec<u8> = Vec::new();
        let mut source = Cursor::new(b"data".to_vec());

        let failures: Vec<FtpError> = vec![
            session.login("user", "pw").err().unwrap(),
            session.passive(true).err().unwrap(),
            session.change_directory("pub").err().unwrap(),
            session.parent_directory().err().unwrap(),
            session.get_directory().err().unwrap(),
            session.create_directory("x").err().unwrap(),
            session.remove_directory("x").err().unwrap(),
            session.list_directory("/").err().unwrap(),
            session.delete("f").err().unwrap(),
            session.size("f").err().unwrap(),
            session.modified_time("f").err().unwrap(),
            session.rename("a", "b").err().unwrap(),
            session.get("local", "remote", TransferMode::Binary, 0).err().unwrap(),
            session.put("remote", "local", TransferMode::Binary, 0).err().unwrap(),
            session
                .stream_get(&mut sink, "remote", TransferMode::Binary, 0)
                .err()
                .unwrap(),
            session
                .stream_put("remote", &mut source, TransferMode::Binary, 0)
                .err()
                .unwrap(),
            session.get_option("autoseek").err().unwrap(),
            session.set_option("timeout_sec", 10).err().unwrap(),
            session.allocate(1024).err().unwrap(),
            session.chmod(0o644, "f").err().unwrap(),
            session.exec("ls").err().unwrap(),
        ];

        for err in failures {
            assert!(matches!(err, FtpError::NotConnected), "{:?}", err);
            assert_eq!(err.kind(), ErrorKind::Precondition);
        }
        assert_eq!(session.last_error(), Some("Not connected"));
        assert!(session.engine().calls().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = connected(MemoryEngine::new());
        assert!(session.is_connected());

        session.close().unwrap();
        assert!(!session.is_connected());
        session.close().unwrap();
        assert!(!session.is_connected());
        assert_eq!(session.engine().open_connections(), 0);

        let err = session.get_directory().unwrap_err();
        assert!(matches!(err, FtpError::NotConnected));
    }

    #[test]
    fn test_failed_close_still_disconnects() {
        let mut session = connected(MemoryEngine::new().failing_close());

        let err = session.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(session
            .last_error()
            .unwrap()
            .starts_with("Unable to close connection"));
        assert!(!session.is_connected());

        // Nothing left to close, so the second call is clean.
        session.close().unwrap();
    }

    #[test]
    fn test_drop_releases_connection() {
        let engine = MemoryEngine::new();
        let gauge = engine.connection_gauge();
        {
            let _session = connected(engine);
            assert_eq!(gauge.load(Ordering::SeqCst), 1);
        }
        assert_eq!(gauge.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listing_is_sorted() {
        let mut session = connected(
            MemoryEngine::new()
                .with_file("/pub/zeta.txt", b"", 0)
                .with_dir("/pub")
                .with_file("/pub/beta.txt", b"", 0)
                .with_dir("/pub/alpha")
                .with_file("/pub/Gamma", b"", 0),
        );

        let names = session.list_directory("/pub").unwrap();
        assert_eq!(names, vec!["Gamma", "alpha", "beta.txt", "zeta.txt"]);
    }

    #[test]
    fn test_size_of_missing_file_fails() {
        let mut session = connected(MemoryEngine::new().with_file("/a.bin", &[0u8; 42], 0));

        assert_eq!(session.size("a.bin").unwrap(), 42);

        let err = session.size("missing.bin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundOrPermission);
        assert!(session
            .last_error()
            .unwrap()
            .starts_with("Unable to get file size"));
    }

    #[test]
    fn test_size_unsupported_by_server() {
        let mut session = connected(
            MemoryEngine::new()
                .with_file("/a.bin", b"abc", 0)
                .without_size(),
        );
        assert!(session.size("a.bin").is_err());
    }

    #[test]
    fn test_invalid_timeout_never_reaches_engine() {
        let mut session = connected(MemoryEngine::new());
        let calls_before = session.engine().calls().len();

        for value in [0, -5] {
            let err = session.set_option("timeout_sec", value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOption);
            assert_eq!(
                session.last_error(),
                Some("Timeout value must be greater than zero")
            );
        }
        assert_eq!(session.engine().calls().len(), calls_before);
    }

    #[test]
    fn test_non_boolean_autoseek_never_reaches_engine() {
        let mut session = connected(MemoryEngine::new());
        let calls_before = session.engine().calls().len();

        let err = session.set_option("autoseek", "yes").unwrap_err();
        assert!(matches!(err, FtpError::InvalidOptionValue(_)));
        assert_eq!(session.last_error(), Some("Autoseek value must be boolean"));
        assert_eq!(session.engine().calls().len(), calls_before);
    }

    #[test]
    fn test_options_round_trip() {
        let mut session = connected(MemoryEngine::new());

        assert_eq!(session.get_option("timeout_sec").unwrap(), OptionValue::Int(30));
        assert_eq!(session.get_option("autoseek").unwrap(), OptionValue::Bool(true));

        session
            .set_option("timeout_sec", 120)
            .unwrap()
            .set_option("autoseek", false)
            .unwrap();
        assert_eq!(session.get_option("timeout_sec").unwrap().as_int(), Some(120));
        assert_eq!(session.get_option("autoseek").unwrap().as_bool(), Some(false));

        let err = session.get_option("blocking").unwrap_err();
        assert!(matches!(err, FtpError::UnsupportedOption(_)));
        assert_eq!(session.last_error(), Some("Unsupported option: blocking"));
    }

    #[test]
    fn test_engine_option_refusal_is_recorded() {
        let mut session = connected(MemoryEngine::new().refusing_options());

        let err = session.set_option("autoseek", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundOrPermission);
        assert!(session.last_error().unwrap().starts_with("Unable to set option"));
    }

    #[test]
    fn test_directory_round_trip() {
        let mut session = connected(MemoryEngine::new());

        session.create_directory("x").unwrap().change_directory("x").unwrap();
        assert_eq!(session.get_directory().unwrap(), "/x");

        session.parent_directory().unwrap().remove_directory("x").unwrap();
        assert_eq!(session.get_directory().unwrap(), "/");
        assert!(!session.engine().is_dir("/x"));
    }

    #[test]
    fn test_parent_directory_at_root_fails() {
        let mut session = connected(MemoryEngine::new());
        let err = session.parent_directory().unwrap_err();
        assert!(err.to_string().starts_with("Unable to get parent folder"));
    }

    #[test]
    fn test_failed_connect_blocks_session_until_reconnect() {
        let mut session = FtpSession::with_engine(MemoryEngine::new().refusing_connections());

        let err = session.connect("ftp.example.com", false, 21, 30).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(session.last_error().unwrap().contains("Unable to connect"));
        assert!(!session.is_connected());
        assert!(session.get_directory().is_err());
        assert!(session.login_anonymous().is_err());

        session.engine_mut().set_refuse_connections(false);
        session
            .connect("ftp.example.com", false, 21, 30)
            .unwrap()
            .login_anonymous()
            .unwrap();
        assert_eq!(session.get_directory().unwrap(), "/");
    }

    #[test]
    fn test_connect_while_connected_is_rejected() {
        let mut session = connected(MemoryEngine::new());

        let err = session.connect("other.example.com", false, 21, 30).unwrap_err();
        assert!(matches!(err, FtpError::AlreadyConnected));
        assert!(session.is_connected());
        assert_eq!(session.engine().open_connections(), 1);
    }

    #[test]
    fn test_connect_validates_arguments() {
        let mut session = FtpSession::with_engine(MemoryEngine::new());

        assert!(matches!(
            session.connect("", false, 21, 30),
            Err(FtpError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.connect("ftp.example.com", false, 21, 0),
            Err(FtpError::InvalidArgument(_))
        ));
        assert!(session.engine().calls().is_empty());
    }

    #[test]
    fn test_login_incorrect() {
        let mut session =
            FtpSession::with_engine(MemoryEngine::new().with_credentials("user", "secret"));
        session.connect("ftp.example.com", false, 21, 30).unwrap();

        let err = session.login("user", "wrong").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(session.last_error().unwrap().starts_with("Login incorrect"));

        session.login("user", "secret").unwrap();
    }

    #[test]
    fn test_put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local.txt");
        let local2 = dir.path().join("local2.txt");
        let content: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        fs::write(&local, &content).unwrap();

        let mut session = connected(MemoryEngine::new());
        session
            .put("remote.txt", &local, TransferMode::Binary, 0)
            .unwrap()
            .get(&local2, "remote.txt", TransferMode::Binary, 0)
            .unwrap();

        assert_eq!(fs::read(&local2).unwrap(), content);
    }

    #[test]
    fn test_resumed_get_fills_local_tail() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("partial.bin");
        fs::write(&local, b"0123").unwrap();

        let mut session = connected(MemoryEngine::new().with_file("/full.bin", b"0123456789", 0));
        session.get(&local, "full.bin", TransferMode::Binary, 4).unwrap();

        assert_eq!(fs::read(&local).unwrap(), b"0123456789");
    }

    #[test]
    fn test_resumed_get_without_autoseek_keeps_only_tail() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("partial.bin");
        fs::write(&local, b"0123").unwrap();

        let mut session = connected(MemoryEngine::new().with_file("/full.bin", b"0123456789", 0));
        session
            .set_option("autoseek", false)
            .unwrap()
            .get(&local, "full.bin", TransferMode::Binary, 4)
            .unwrap();

        assert_eq!(fs::read(&local).unwrap(), b"456789");
    }

    #[test]
    fn test_resumed_put_appends_local_tail() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("full.bin");
        fs::write(&local, b"0123456789").unwrap();

        let mut session = connected(MemoryEngine::new().with_file("/partial.bin", b"0123", 0));
        session.put("partial.bin", &local, TransferMode::Binary, 4).unwrap();

        assert_eq!(session.engine().file("/partial.bin").unwrap().data, b"0123456789");
    }

    #[test]
    fn test_get_missing_remote_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = connected(MemoryEngine::new());

        let err = session
            .get(dir.path().join("out"), "nope.txt", TransferMode::Ascii, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert!(session
            .last_error()
            .unwrap()
            .starts_with("Unable to get or save file"));
    }

    #[test]
    fn test_stream_transfers() {
        let mut session = connected(MemoryEngine::new());

        let mut source = Cursor::new(b"streamed content".to_vec());
        session
            .stream_put("s.txt", &mut source, TransferMode::Binary, 0)
            .unwrap();

        let mut sink = Vec::new();
        session
            .stream_get(&mut sink, "s.txt", TransferMode::Binary, 9)
            .unwrap();
        assert_eq!(sink, b"content");
    }

    #[test]
    fn test_rename_failure_records_message() {
        let mut session = connected(MemoryEngine::new().with_file("/a", b"a", 0));

        session.rename("a", "b").unwrap();
        assert!(session.engine().file("/b").is_some());

        let err = session.rename("a", "c").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundOrPermission);
        assert!(session.last_error().unwrap().starts_with("Unable to rename"));
    }

    #[test]
    fn test_delete_and_modified_time() {
        let mut session = connected(MemoryEngine::new().with_file("/old.log", b"x", 1_700_000_000));

        assert_eq!(session.modified_time("old.log").unwrap(), 1_700_000_000);
        assert_eq!(
            session.modified_time_formatted("old.log", "%Y").unwrap(),
            "2023"
        );

        session.delete("old.log").unwrap();
        let err = session.modified_time("old.log").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Unable to get modification time"));
        assert!(session.delete("old.log").is_err());
    }

    #[test]
    fn test_bad_time_format_is_an_error() {
        let mut session = connected(MemoryEngine::new().with_file("/f", b"x", 1_700_000_000));
        let err = session.modified_time_formatted("f", "%Q%").unwrap_err();
        assert!(matches!(err, FtpError::InvalidArgument(_)));
    }

    #[test]
    fn test_site_commands() {
        let mut session = connected(MemoryEngine::new().with_file("/script.sh", b"#!/bin/sh", 0));

        session
            .chmod(0o755, "script.sh")
            .unwrap()
            .allocate(2048)
            .unwrap()
            .exec("touch marker")
            .unwrap()
            .passive(false)
            .unwrap();
        assert_eq!(session.engine().file("/script.sh").unwrap().mode, 0o755);
        assert_eq!(session.engine().executed(), ["touch marker".to_string()]);
    }

    #[test]
    fn test_disabled_site_commands_fail() {
        let mut session = connected(MemoryEngine::new().without_site_exec().without_alloc());

        assert!(session
            .exec("rm -rf /")
            .unwrap_err()
            .to_string()
            .starts_with("Unable to exec command"));
        assert!(session
            .allocate(1)
            .unwrap_err()
            .to_string()
            .starts_with("Unable to allocate"));
    }

    #[test]
    fn test_last_error_survives_success() {
        let mut session = connected(MemoryEngine::new());

        assert!(session.change_directory("missing").is_err());
        let recorded = session.last_error().map(str::to_string);
        assert!(recorded.as_deref().unwrap().starts_with("Unable to change directory"));

        session.get_directory().unwrap();
        assert_eq!(session.last_error().map(str::to_string), recorded);

        session.set_error("custom");
        assert_eq!(session.last_error(), Some("custom"));
    }

    #[test]
    fn test_empty_path_rejected_locally() {
        let mut session = connected(MemoryEngine::new());
        let calls_before = session.engine().calls().len();

        assert!(matches!(
            session.change_directory(""),
            Err(FtpError::InvalidArgument(_))
        ));
        assert_eq!(session.engine().calls().len(), calls_before);
    }
}
