//! Path classification for the session gate.
//!
//! DESIGN
//! ======
//! Classification is a declarative table of `(Matcher, PathKind)` rows read
//! top to bottom; the first matching row wins. Row order is the priority:
//! static assets, creation routes, resource details, public pages, dashboard.
//!
//! Creation routes (`/campaigns/new`) sit under public collections but need a
//! login. Besides their priority, `new` is a reserved id segment, so
//! `/<collection>/new` is never a detail view even if a creation route is
//! missing from the table.
//!
//! Public prefix rows are segment-aware: `/about` covers `/about` and
//! `/about/team` but not `/aboutus`. The dashboard row is a plain prefix, so
//! `/dashboards` is protected too.
//!
//! Rules apply to canonical paths only. [`normalize`] maps a raw request path
//! to the file the site directory would serve, so spellings like
//! `//dashboard/` or `/%64ashboard` cannot dodge a row.

/// Category of a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    /// Framework bundles and images; the gate does nothing.
    StaticAsset,
    /// Anonymous browsing.
    Public,
    /// `/<collection>/<id>` under a public collection.
    DetailView,
    /// Creation route that needs a session.
    SpecialAuth,
    /// `/dashboard` and below; needs a session and a completed profile.
    Dashboard,
    /// Unclassified; allowed through without a session check.
    Other,
}

impl PathKind {
    /// True when the gate must validate a session for this kind.
    #[must_use]
    pub fn needs_session(self) -> bool {
        matches!(self, Self::SpecialAuth | Self::Dashboard)
    }
}

#[derive(Clone, Copy, Debug)]
enum Matcher {
    Exact(&'static str),
    /// Segment-aware prefix.
    Prefix(&'static str),
    /// Plain string prefix.
    StartsWith(&'static str),
    /// File extension (includes the dot).
    EndsWith(&'static str),
    /// `<collection>/<id>` with exactly one non-reserved id segment.
    DetailOf(&'static str),
}

/// Id segment reserved for creation routes.
pub const RESERVED_SEGMENT: &str = "new";

pub const DASHBOARD_PREFIX: &str = "/dashboard";
pub const PROFILE_COMPLETE_PATH: &str = "/dashboard/profile/complete";
pub const PROFILE_PATH: &str = "/dashboard/profile";
pub const LOGIN_PATH: &str = "/auth/login";

const RULES: &[(Matcher, PathKind)] = &[
    (Matcher::StartsWith("/_next"), PathKind::StaticAsset),
    (Matcher::Exact("/favicon.ico"), PathKind::StaticAsset),
    (Matcher::EndsWith(".svg"), PathKind::StaticAsset),
    (Matcher::EndsWith(".png"), PathKind::StaticAsset),
    (Matcher::EndsWith(".jpg"), PathKind::StaticAsset),
    (Matcher::EndsWith(".jpeg"), PathKind::StaticAsset),
    (Matcher::EndsWith(".gif"), PathKind::StaticAsset),
    (Matcher::EndsWith(".webp"), PathKind::StaticAsset),
    (Matcher::Exact("/campaigns/new"), PathKind::SpecialAuth),
    (Matcher::Exact("/help-requests/new"), PathKind::SpecialAuth),
    (Matcher::Exact("/community-drives/new"), PathKind::SpecialAuth),
    (Matcher::Exact("/donation-items/new"), PathKind::SpecialAuth),
    (Matcher::Exact("/create-campaign"), PathKind::SpecialAuth),
    (Matcher::DetailOf("/campaigns"), PathKind::DetailView),
    (Matcher::DetailOf("/help-requests"), PathKind::DetailView),
    (Matcher::DetailOf("/community-drives"), PathKind::DetailView),
    (Matcher::DetailOf("/directory"), PathKind::DetailView),
    (Matcher::DetailOf("/donation-items"), PathKind::DetailView),
    (Matcher::Exact("/"), PathKind::Public),
    (Matcher::Prefix("/about"), PathKind::Public),
    (Matcher::Prefix("/campaigns"), PathKind::Public),
    (Matcher::Prefix("/help-requests"), PathKind::Public),
    (Matcher::Prefix("/community-drives"), PathKind::Public),
    (Matcher::Prefix("/directory"), PathKind::Public),
    (Matcher::Prefix("/auth/login"), PathKind::Public),
    (Matcher::Prefix("/auth/register"), PathKind::Public),
    (Matcher::Prefix("/donation-items"), PathKind::Public),
    (Matcher::StartsWith(DASHBOARD_PREFIX), PathKind::Dashboard),
];

/// Dashboard paths that skip the profile-completion check. API and
/// framework paths never classify as dashboard, so they need no row here.
const PROFILE_EXEMPT: &[Matcher] = &[Matcher::Exact(PROFILE_COMPLETE_PATH), Matcher::Exact(PROFILE_PATH)];

impl Matcher {
    fn matches(self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => path
                .strip_prefix(p)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            Self::StartsWith(p) => path.starts_with(p),
            Self::EndsWith(ext) => path.ends_with(ext),
            Self::DetailOf(collection) => path
                .strip_prefix(collection)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|id| !id.is_empty() && !id.contains('/') && id != RESERVED_SEGMENT),
        }
    }
}

/// Canonical form of a raw request path, resolved the way the site
/// directory resolves it: percent-decoded, empty and `.` segments dropped,
/// `..` applied, no trailing slash. `None` when the path does not decode to
/// UTF-8.
#[must_use]
pub fn normalize(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Classify a canonical request path (see [`normalize`]).
#[must_use]
pub fn classify(path: &str) -> PathKind {
    RULES
        .iter()
        .find(|(matcher, _)| matcher.matches(path))
        .map_or(PathKind::Other, |(_, kind)| *kind)
}

/// True for dashboard paths reachable before the profile is complete.
#[must_use]
pub fn is_profile_exempt(path: &str) -> bool {
    PROFILE_EXEMPT.iter().any(|m| m.matches(path))
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
