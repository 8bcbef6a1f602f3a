//! File handle integration tests: buffered and multipart writes, reads.

#[cfg(test)]
mod tests {
    use std::io::SeekFrom;

    use s3vfs_core::{Basic, FsConfig, FsError, O_WRMULTIPART, ReadStrategy};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    /// Smallest part size S3 accepts for every part but the last.
    const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_buffered_file() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "buffered").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let data: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 199) as u8).collect();
        let mut file = fs.create("dir/blob.bin").await.expect("create");
        for chunk in data.chunks(100_000) {
            file.write(chunk).await.expect("write");
        }
        file.close().await.expect("close");

        let mut file = fs.open("dir/blob.bin").await.expect("open");
        let read = file.read_to_end().await.expect("read");
        file.close().await.expect("close reader");
        assert_eq!(read, data);

        let info = fs.stat("dir/blob.bin").await.expect("stat");
        assert_eq!(info.size, data.len() as u64);
        assert!(info.modified.is_some());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_multipart_file() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "multipart").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let part1 = vec![b'a'; MIN_PART_SIZE];
        let part2 = vec![b'b'; MIN_PART_SIZE];
        let part3 = b"tail".to_vec();

        let mut file = fs
            .open_file("big.bin", O_WRMULTIPART, 0o666)
            .await
            .expect("open multipart");
        for part in [&part1, &part2, &part3] {
            file.write(part).await.expect("upload part");
        }
        file.close().await.expect("complete");

        let mut file = fs.open("big.bin").await.expect("open");
        let read = file.read_to_end().await.expect("read");
        assert_eq!(read.len(), part1.len() + part2.len() + part3.len());
        assert_eq!(&read[..MIN_PART_SIZE], &part1[..]);
        assert_eq!(&read[MIN_PART_SIZE..2 * MIN_PART_SIZE], &part2[..]);
        assert_eq!(&read[2 * MIN_PART_SIZE..], &part3[..]);

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("big.bin")
            .send()
            .await
            .expect("head");
        assert!(head.e_tag().is_some_and(|e| e.ends_with("-3\"")));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_store_empty_multipart_file() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mp-empty").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let mut file = fs
            .open_file("empty.bin", O_WRMULTIPART, 0o666)
            .await
            .expect("open multipart");
        file.close().await.expect("close");

        assert_eq!(fs.stat("empty.bin").await.expect("stat").size, 0);
        let uploads = client
            .list_multipart_uploads()
            .bucket(&bucket)
            .send()
            .await
            .expect("list uploads");
        assert!(uploads.uploads().is_empty());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "missing").await;
        let fs = test_fs(&client, &bucket, FsConfig::default());

        let err = fs.open("nope.txt").await.expect_err("should fail");
        assert!(matches!(err, FsError::NotFound { .. }));
        assert!(fs.stat("nope.txt").await.expect_err("should fail").is_not_found());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_seek_in_buffered_reader() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "seek").await;
        let config = FsConfig::builder()
            .read_strategy(ReadStrategy::Buffered)
            .build();
        let fs = test_fs(&client, &bucket, config);

        let mut file = fs.create("digits.txt").await.expect("create");
        file.write(b"0123456789").await.expect("write");
        file.close().await.expect("close");

        let mut file = fs.open("digits.txt").await.expect("open");
        file.seek(SeekFrom::End(-3)).await.expect("seek");
        let mut buf = [0u8; 3];
        assert_eq!(file.read(&mut buf).await.expect("read"), 3);
        assert_eq!(&buf, b"789");

        cleanup_bucket(&client, &bucket).await;
    }
}
