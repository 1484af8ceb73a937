use crate::handler::DownloadRequest;
use percent_encoding::percent_decode_str;

#[derive(Debug)]
enum PathSegment {
    Static(&'static str),
    Param,
}

/// `targets/{target}/runs/{run}/artifacts/{artifact}/*`
const DOWNLOAD_SEGMENTS: [PathSegment; 6] = [
    PathSegment::Static("targets"),
    PathSegment::Param,
    PathSegment::Static("runs"),
    PathSegment::Param,
    PathSegment::Static("artifacts"),
    PathSegment::Param,
];

/// Matches `{base}/targets/{target}/runs/{run}/artifacts/{artifact}/{filename...}`.
#[derive(Debug)]
pub struct DownloadRoute {
    base: Vec<String>,
}

impl DownloadRoute {
    pub fn new(base_path: &str) -> Self {
        let base = base_path
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        DownloadRoute { base }
    }

    /// Returns the decoded path parameters if `path` addresses an artifact.
    /// The artifact name must be followed by a slash; everything after it,
    /// possibly nothing, is the filename.
    pub fn matches(&self, path: &str) -> Option<DownloadRequest> {
        let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');

        for expected in &self.base {
            if segments.next()? != expected {
                return None;
            }
        }

        let mut params = Vec::with_capacity(3);
        for segment in &DOWNLOAD_SEGMENTS {
            let actual = segments.next()?;
            match segment {
                PathSegment::Static(expected) => {
                    if actual != *expected {
                        return None;
                    }
                }
                PathSegment::Param => {
                    if actual.is_empty() {
                        return None;
                    }
                    params.push(decode(actual)?);
                }
            }
        }

        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return None;
        }
        let filename = rest
            .into_iter()
            .map(decode)
            .collect::<Option<Vec<_>>>()?
            .join("/");

        let [target, run, artifact] = <[String; 3]>::try_from(params).ok()?;
        Some(DownloadRequest {
            target,
            run,
            artifact,
            filename,
        })
    }
}

fn decode(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}
