use owo_colors::OwoColorize;
use sl_core::{err, info, mirrors::ForgeMirrors, pt, HttpResponse, HttpTransport, ProgressReporter};
use tokio_util::sync::CancellationToken;

use crate::loaders::LoaderInstallError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Anything smaller is an error page, not an installer.
const MIN_SIZE: usize = 100;

/// Downloads the installer jar for `build`, trying every
/// configured mirror in order and then the CORS proxy.
///
/// Per-mirror failures are only logged; the caller sees
/// the payload or [`LoaderInstallError::AllMirrorsFailed`].
pub async fn download_installer(
    transport: &dyn HttpTransport,
    mirrors: &ForgeMirrors,
    build: &str,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, LoaderInstallError> {
    let mut last_error = String::from("no mirrors configured");
    let total = mirrors.installers.len() + usize::from(mirrors.cors_proxy.is_some());

    for (i, mirror) in mirrors.installers.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(LoaderInstallError::Cancelled);
        }
        let url = mirror.render("", "", build);
        progress.progress(i, total, format!("Trying {}", mirror.name));
        pt!("{}: {}", "Trying".underline(), url.bright_black());

        match fetch_checked(transport, mirrors, &url, true).await {
            Ok(bytes) => {
                info!("Downloaded Forge installer from {} ({} bytes)", mirror.name, bytes.len());
                return Ok(bytes);
            }
            Err(reason) => {
                err!("{}: {reason}", mirror.name);
                last_error = format!("{}: {reason}", mirror.name);
            }
        }
    }

    if let (Some(proxy), Some(primary)) = (&mirrors.cors_proxy, mirrors.installers.first()) {
        if cancel.is_cancelled() {
            return Err(LoaderInstallError::Cancelled);
        }
        let original = primary.render("", "", build);
        let url = proxy.replace("{url}", &urlencoding::encode(&original));
        progress.progress(total - 1, total, "Trying through a proxy");
        match fetch_checked(transport, mirrors, &url, false).await {
            Ok(bytes) => {
                info!("Downloaded Forge installer through the proxy");
                return Ok(bytes);
            }
            Err(reason) => {
                err!("Proxy: {reason}");
                last_error = format!("proxy: {reason}");
            }
        }
    }

    Err(LoaderInstallError::AllMirrorsFailed {
        build: build.to_owned(),
        last_error,
    })
}

/// Follows redirects by hand (skipping blocked hosts) and
/// validates the payload.
async fn fetch_checked(
    transport: &dyn HttpTransport,
    mirrors: &ForgeMirrors,
    url: &str,
    check_content_type: bool,
) -> Result<Vec<u8>, String> {
    let mut response = transport
        .get_no_redirect(url)
        .await
        .map_err(|n| n.summary())?;

    let mut hops = 0;
    while response.is_redirect() {
        if hops >= mirrors.max_redirects {
            return Err(format!("more than {} redirects", mirrors.max_redirects));
        }
        let Some(location) = response.header("location") else {
            return Err(format!("HTTP {} without a location", response.status));
        };
        let next = resolve_location(&response.url, location);
        if mirrors.is_blocked(&next) {
            return Err(format!("redirect to blocked host skipped: {next}"));
        }
        pt!("{} {}", "Redirect:".bright_black(), next.bright_black());
        response = transport
            .get_no_redirect(&next)
            .await
            .map_err(|n| n.summary())?;
        hops += 1;
    }

    if response.status != 200 {
        return Err(format!("HTTP {}", response.status));
    }
    if check_content_type {
        check_content_type_header(&response)?;
    }
    validate_archive(&response)?;
    Ok(response.body)
}

fn resolve_location(base: &str, location: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|n| n.join(location))
        .map_or_else(|_| location.to_owned(), String::from)
}

fn check_content_type_header(response: &HttpResponse) -> Result<(), String> {
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_lowercase();
    let is_archive = content_type.contains("application/java-archive")
        || content_type.contains("application/x-java-archive")
        || content_type.contains("application/octet-stream")
        || content_type.ends_with("/jar");
    if is_archive {
        Ok(())
    } else {
        Err(format!("unexpected content type {content_type:?}"))
    }
}

fn validate_archive(response: &HttpResponse) -> Result<(), String> {
    let size = response.body.len();
    if let Some(expected) = response
        .header("content-length")
        .and_then(|n| n.trim().parse::<usize>().ok())
    {
        if expected != size {
            return Err(format!("incomplete download ({size} of {expected} bytes)"));
        }
    }
    if size < MIN_SIZE {
        return Err(format!("file too small ({size} bytes)"));
    }
    if !response.body.starts_with(ZIP_MAGIC) {
        return Err("not a jar (bad signature)".to_owned());
    }
    Ok(())
}
