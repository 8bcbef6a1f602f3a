//! Directory integration tests: listing, markers, stat, chroot.

#[cfg(test)]
mod tests {
    use s3vfs_core::{Basic, Chroot, Dir, FsConfig};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    async fn put(client: &aws_sdk_s3::Client, bucket: &str, key: &str) {
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(bytes::Bytes::from(key.to_owned()).into())
            .send()
            .await
            .expect("put_object");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_directories_then_files() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "readdir").await;
        for key in ["a/1", "a/2", "a/b/3"] {
            put(&client, &bucket, key).await;
        }
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let entries = fs.read_dir("a").await.expect("read_dir");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a/b/", "a/1", "a/2"]);
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].size, 3);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_through_large_directory() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "paging").await;
        for i in 0..25 {
            put(&client, &bucket, &format!("many/f{i:02}")).await;
        }
        for i in 0..5 {
            put(&client, &bucket, &format!("many/sub{i}/x")).await;
        }
        let config = FsConfig::builder().list_page_size(Some(7)).build();
        let fs = test_fs(&client, &bucket, config);

        let entries = fs.read_dir("many").await.expect("read_dir");
        assert_eq!(entries.len(), 30);
        assert!(entries[..5].iter().all(|e| e.is_dir()));
        assert!(entries[5..].iter().all(|e| !e.is_dir()));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_directory_markers() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mkdir").await;
        let config = FsConfig::builder().directory_markers(true).build();
        let fs = test_fs(&client, &bucket, config);

        fs.mkdir_all("x/y", 0o755).await.expect("mkdir_all");
        let names: Vec<String> = fs
            .read_dir("x")
            .await
            .expect("read_dir")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["x/y/"]);
        assert!(fs.stat("x/y").await.expect("stat").is_dir());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_scope_chroot() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "chroot").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());
        let scoped = fs.chroot("home/alice").expect("chroot");

        let mut file = scoped.create("notes.md").await.expect("create");
        file.write(b"# notes").await.expect("write");
        file.close().await.expect("close");

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("home/alice/notes.md")
            .send()
            .await
            .expect("head");
        assert_eq!(head.content_length(), Some(7));

        cleanup_bucket(&client, &bucket).await;
    }
}
