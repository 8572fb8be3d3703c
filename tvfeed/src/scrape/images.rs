use std::path::{Path, PathBuf};

use reqwest::Client;
use url::Url;

use crate::config::ScrapeConfig;
use crate::http::fetch_bytes;
use crate::util::url::is_http;

/// One image to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    /// Position of the image on the page; keeps file names unique.
    pub index: usize,
    pub url: String,
    pub file_name: String,
}

/// Outcome of a download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

/// Plan downloads for the http(s) sources; everything else is skipped.
pub fn plan_downloads(sources: &[String], config: &ScrapeConfig) -> Vec<ImageJob> {
    sources
        .iter()
        .enumerate()
        .filter(|(_, src)| is_http(src))
        .map(|(index, src)| {
            let ext = image_extension(src).unwrap_or_else(|| config.default_extension.clone());
            ImageJob {
                index,
                url: src.clone(),
                file_name: format!("{}_{}{}", config.file_prefix, index, ext),
            }
        })
        .collect()
}

/// Extension of the URL path's last segment, with its leading dot.
pub fn image_extension(src: &str) -> Option<String> {
    let url = Url::parse(src).ok()?;
    let ext = Path::new(url.path()).extension()?.to_str()?;
    if ext.is_empty() {
        None
    } else {
        Some(format!(".{}", ext))
    }
}

/**
    Download each job in order into `output_dir`.

    Failures are logged and counted; they never stop the batch.
*/
pub async fn download_images(client: &Client, jobs: &[ImageJob], output_dir: &Path) -> DownloadSummary {
    let mut summary = DownloadSummary::default();

    for job in jobs {
        let path = output_dir.join(&job.file_name);

        let data = match fetch_bytes(client, &job.url).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(url = %job.url, error = %e, "Error downloading image");
                summary.failed += 1;
                continue;
            }
        };

        if let Err(e) = tokio::fs::write(&path, &data).await {
            tracing::error!(path = %path.display(), error = %e, "Error saving image");
            summary.failed += 1;
            continue;
        }

        tracing::info!(path = %path.display(), bytes = data.len(), "Downloaded");
        summary.saved.push(path);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_download_client;
    use crate::http::test_server::{Canned, serve};

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://a.example/x/logo.png").as_deref(), Some(".png"));
        assert_eq!(
            image_extension("https://a.example/x/photo.jpeg?w=200#top").as_deref(),
            Some(".jpeg")
        );
        assert_eq!(image_extension("https://a.example/x/noext"), None);
        assert_eq!(image_extension("https://a.example/dir.d/file"), None);
        assert_eq!(image_extension("https://a.example/"), None);
        assert_eq!(image_extension("not a url"), None);
    }

    #[test]
    fn test_plan_keeps_index_and_defaults() {
        let sources: Vec<String> = [
            "https://a.example/one.png",
            "data:image/gif;base64,AAAA",
            "",
            "http://b.example/two",
            "/relative/three.gif",
            "https://c.example/four.webp",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let jobs = plan_downloads(&sources, &ScrapeConfig::default());
        let names: Vec<&str> = jobs.iter().map(|j| j.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["channel_image_0.png", "channel_image_3.jpg", "channel_image_5.webp"]
        );
        assert_eq!(jobs[1].url, "http://b.example/two");
    }

    #[tokio::test]
    async fn test_download_continues_after_failure() {
        let (base, _hits) = serve(vec![
            Canned::text(404, "missing"),
            Canned {
                status: 200,
                content_type: "image/png",
                body: vec![0x89, 0x50, 0x4E, 0x47],
            },
        ])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            ImageJob {
                index: 0,
                url: format!("{base}/gone.png"),
                file_name: "img_0.png".into(),
            },
            ImageJob {
                index: 1,
                url: format!("{base}/ok.png"),
                file_name: "img_1.png".into(),
            },
        ];

        let client =
            build_download_client("tvfeed-test", std::time::Duration::from_secs(5), None).unwrap();
        let summary = download_images(&client, &jobs, dir.path()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.saved, vec![dir.path().join("img_1.png")]);
        assert_eq!(
            std::fs::read(dir.path().join("img_1.png")).unwrap(),
            vec![0x89, 0x50, 0x4E, 0x47]
        );
        assert!(!dir.path().join("img_0.png").exists());
    }
}
