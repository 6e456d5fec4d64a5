//! Image localization through whole conversions.

use std::time::Duration;

use httpmock::prelude::*;
use reqwest::Url;
use tempfile::TempDir;
use web2md::{build_client, Converter, ConverterConfig, ImageError, ImageHandler};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nimage-bytes";

fn converter(dir: &TempDir) -> Converter {
    Converter::new(ConverterConfig {
        download_images: true,
        image_folder: dir.path().join("images"),
        max_retries: 0,
        timeout: 5,
        ..Default::default()
    })
    .unwrap()
}

fn only_file(dir: &TempDir) -> String {
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("images"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1, "expected one image, found {:?}", entries);
    entries[0].to_str().unwrap().replace('\\', "/")
}

#[tokio::test]
async fn duplicate_images_are_fetched_once() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/img/cat.png");
            then.status(200).header("content-type", "image/png").body(PNG);
        })
        .await;

    let html = format!(
        r#"<p><img src="img/cat.png" alt="one"></p><p><img src="{}" alt="two"></p>"#,
        server.url("/img/cat.png")
    );
    let base = Url::parse(&server.url("/posts/index.html")).unwrap();
    let base = base.join("/").unwrap();

    let mut converter = converter(&dir);
    let result = converter.convert_html(&html, Some(&base)).await;

    let local = only_file(&dir);
    assert_eq!(
        result.markdown,
        format!("![one]({0})\n\n![two]({0})\n", local)
    );
    assert!(result.failed_images.is_empty());
    mock.assert_hits_async(1).await;

    // The cache outlives the conversion.
    let again = converter.convert_html(&html, Some(&base)).await;
    assert_eq!(again.markdown, result.markdown);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn one_bad_image_does_not_fail_the_document() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/good.gif");
            then.status(200).header("content-type", "image/gif").body(PNG);
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/bad.gif");
            then.status(404);
        })
        .await;

    let bad = server.url("/bad.gif");
    let html = format!(
        r#"<h1>Gallery</h1><p><img src="{good}"> and <img src="{bad}"></p><p><img src="{bad}"></p>"#,
        good = server.url("/good.gif"),
        bad = bad
    );

    let mut converter = converter(&dir);
    let result = converter.convert_html(&html, None).await;

    let local = only_file(&dir);
    assert!(local.ends_with(".gif"));
    assert_eq!(
        result.markdown,
        format!("# Gallery\n\n![]({}) and ![]({})\n\n![]({})\n", local, bad, bad)
    );
    assert_eq!(result.failed_images.len(), 1);
    assert_eq!(result.failed_images[0].source, bad);
    missing.assert_hits_async(1).await;
}

fn image_handler(dir: &TempDir, max_retries: u32) -> ImageHandler {
    let config = ConverterConfig {
        download_images: true,
        image_folder: dir.path().join("images"),
        max_retries,
        timeout: 5,
        ..Default::default()
    };
    ImageHandler::new(&config, build_client(&config).unwrap())
}

#[tokio::test]
async fn unavailable_image_is_retried() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/busy.png");
            then.status(503);
        })
        .await;

    let mut images = image_handler(&dir, 2);
    let err = images.acquire(&server.url("/busy.png"), None).await.unwrap_err();

    assert!(matches!(err, ImageError::Network(_)), "{:?}", err);
    mock.assert_hits_async(3).await;
    assert!(images.cached_images().is_empty());
}

#[tokio::test]
async fn image_recovers_after_transient_failure() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let mut busy = server
        .mock_async(|when, then| {
            when.method(GET).path("/later.png");
            then.status(503);
        })
        .await;

    let mut images = image_handler(&dir, 3);
    let src = server.url("/later.png");
    let task = tokio::spawn(async move {
        let result = images.acquire(&src, None).await;
        (images, result)
    });

    while busy.hits_async().await == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let ready = server
        .mock_async(|when, then| {
            when.method(GET).path("/later.png");
            then.status(200).header("content-type", "image/png").body(PNG);
        })
        .await;
    busy.delete_async().await;

    let (images, result) = task.await.unwrap();
    let path = result.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), PNG);
    assert!(path.to_str().unwrap().ends_with(".png"));
    assert_eq!(images.cached_images().len(), 1);
    ready.assert_hits_async(1).await;
}

#[tokio::test]
async fn oversized_image_keeps_remote_reference() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/huge.jpg");
            then.status(200).body(vec![7u8; 4096]);
        })
        .await;

    let mut converter = Converter::new(ConverterConfig {
        download_images: true,
        image_folder: dir.path().join("images"),
        max_image_size: 1024,
        ..Default::default()
    })
    .unwrap();
    let src = server.url("/huge.jpg");
    let result = converter
        .convert_html(&format!(r#"<img src="{}">"#, src), None)
        .await;

    assert_eq!(result.markdown, format!("![]({})\n", src));
    assert!(result.failed_images[0].reason.contains("1024"));
    assert!(converter.images().cached_images().is_empty());
}

#[tokio::test]
async fn cancelled_conversion_leaves_no_cache_entry() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow.png");
            then.status(200)
                .header("content-type", "image/png")
                .body(PNG)
                .delay(Duration::from_secs(3));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/fast.png");
            then.status(200).header("content-type", "image/png").body(PNG);
        })
        .await;

    let mut converter = converter(&dir);
    let html = format!(r#"<img src="{}">"#, server.url("/slow.png"));
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        converter.convert_html(&html, None),
    )
    .await;
    assert!(outcome.is_err());
    assert!(converter.images().cached_images().is_empty());

    let html = format!(r#"<img src="{}">"#, server.url("/fast.png"));
    let result = converter.convert_html(&html, None).await;
    assert!(result.failed_images.is_empty());
    assert_eq!(converter.images().cached_images().len(), 1);
}

#[tokio::test]
async fn independent_conversions_run_concurrently() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).header("content-type", "image/webp").body(PNG);
        })
        .await;

    let mut tasks = Vec::new();
    for n in 0..4 {
        let folder = dir.path().join(format!("images-{}", n));
        let html = format!(
            "<ul><li>doc {n}<ul><li><img src=\"{}\"></li></ul></li></ul>",
            server.url(&format!("/pic-{}.webp", n))
        );
        tasks.push(tokio::spawn(async move {
            let mut converter = Converter::new(ConverterConfig {
                download_images: true,
                image_folder: folder,
                ..Default::default()
            })
            .unwrap();
            converter.convert_html(&html, None).await
        }));
    }

    for (n, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap();
        assert!(result.failed_images.is_empty());
        assert!(result.markdown.starts_with(&format!("- doc {}\n  - ![](", n)));
        assert!(result.markdown.contains(&format!("images-{}/pic-{}-", n, n)));
        assert!(result.markdown.ends_with(".webp)\n"));
    }
}

#[tokio::test]
async fn images_next_to_a_local_file() {
    let dir = TempDir::new().unwrap();
    let site = dir.path().join("site");
    std::fs::create_dir_all(site.join("img")).unwrap();
    std::fs::write(site.join("img/logo.svg"), "<svg/>").unwrap();
    std::fs::write(
        site.join("index.html"),
        r#"<p><img src="img/logo.svg" alt="logo"> <img src="img/none.png"></p>"#,
    )
    .unwrap();

    let mut converter = converter(&dir);
    let result = converter.convert_file(site.join("index.html")).await.unwrap();

    let local = only_file(&dir);
    assert!(local.ends_with(".svg"));
    assert_eq!(
        result.markdown,
        format!("![logo]({}) ![](img/none.png)\n", local)
    );
    assert_eq!(result.failed_images.len(), 1);
}
