//! Rename and remove integration tests.

#[cfg(test)]
mod tests {
    use s3vfs_core::{Basic, FsConfig};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_rename_file() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "rename").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let mut file = fs.create("old name.txt").await.expect("create");
        file.write(b"payload").await.expect("write");
        file.close().await.expect("close");

        fs.rename("old name.txt", "new/name.txt").await.expect("rename");
        assert!(fs.stat("old name.txt").await.expect_err("gone").is_not_found());

        let mut file = fs.open("new/name.txt").await.expect("open");
        assert_eq!(file.read_to_end().await.expect("read"), b"payload");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_rename_of_missing_file() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "rename-missing").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let err = fs.rename("nope", "other").await.expect_err("should fail");
        assert!(err.is_not_found());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_remove_idempotently() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "remove").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let mut file = fs.create("f.txt").await.expect("create");
        file.close().await.expect("close");

        fs.remove("f.txt").await.expect("remove");
        fs.remove("f.txt").await.expect("remove again");
        assert!(fs.stat("f.txt").await.expect_err("gone").is_not_found());

        cleanup_bucket(&client, &bucket).await;
    }
}
