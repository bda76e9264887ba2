use std::{
    path::{Component, Path},
    sync::LazyLock,
};

use regex::Regex;

use crate::error::{Error, Result};

/// Season assumed when the show folder carries no `(<n>)` suffix.
pub const DEFAULT_SEASON: u32 = 1;

/// `Name (2)` style show folder. Whitespace around the parenthetical is
/// allowed and not part of the show name.
static SHOW_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<name>.*?)\s*\((?<season>\d+)\)\s*$")
        .expect("show folder pattern is valid")
});

/// Show, season and episode derived from where a subtitle file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMetadata {
    pub show: String,
    pub season: u32,
    pub episode: u32,
}

/// Derive episode metadata from `path`, which must live under `root`.
///
/// The first path segment below `root` names the show (and optionally the
/// season); the file stem is the episode number.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use subsearch::metadata::extract_metadata;
///
/// let meta = extract_metadata(
///     Path::new("/subs/Vinland Saga (2)/07.srt"),
///     Path::new("/subs"),
/// )
/// .unwrap();
/// assert_eq!(meta.show, "Vinland Saga");
/// assert_eq!(meta.season, 2);
/// assert_eq!(meta.episode, 7);
/// ```
pub fn extract_metadata(path: &Path, root: &Path) -> Result<EpisodeMetadata> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::PathNotFound(path.to_path_buf()))?;

    let mut components = relative.components();
    let show_folder = match components.next() {
        Some(Component::Normal(folder)) => folder.to_string_lossy(),
        _ => return Err(Error::UnparseableShowFolder(path.to_path_buf())),
    };
    // A file sitting directly under the root has no show folder.
    if components.next().is_none() {
        return Err(Error::UnparseableShowFolder(path.to_path_buf()));
    }

    let (show, season) = parse_show_folder(&show_folder)
        .ok_or_else(|| Error::UnparseableShowFolder(path.to_path_buf()))?;

    let episode = parse_episode(path)?;

    Ok(EpisodeMetadata {
        show,
        season,
        episode,
    })
}

/// Split a show folder name into `(show, season)`.
///
/// Folders that do not carry a usable season suffix keep their whole
/// (trimmed) name as the show and fall back to [`DEFAULT_SEASON`]. Returns
/// `None` only for a folder name that is blank.
pub fn parse_show_folder(folder: &str) -> Option<(String, u32)> {
    let whole = folder.trim();
    if whole.is_empty() {
        return None;
    }

    if let Some(caps) = SHOW_FOLDER.captures(whole) {
        let name = caps["name"].trim();
        let season = caps["season"].parse::<u32>().ok().filter(|s| *s >= 1);
        if let Some(season) = season
            && !name.is_empty()
        {
            return Some((name.to_string(), season));
        }
    }

    Some((whole.to_string(), DEFAULT_SEASON))
}

fn parse_episode(path: &Path) -> Result<u32> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .and_then(|stem| stem.parse::<u32>().ok())
        .ok_or_else(|| Error::InvalidEpisodeName(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(rel: &str) -> Result<EpisodeMetadata> {
        let root = Path::new("/corpus");
        extract_metadata(&root.join(rel), root)
    }

    #[test]
    fn season_from_parenthetical() {
        let meta = extract("Vinland Saga (1)/1.srt").unwrap();
        assert_eq!(
            meta,
            EpisodeMetadata {
                show: "Vinland Saga".to_string(),
                season: 1,
                episode: 1,
            }
        );
    }

    #[test]
    fn season_without_space() {
        let meta = extract("Frieren(2)/12.srt").unwrap();
        assert_eq!(meta.show, "Frieren");
        assert_eq!(meta.season, 2);
        assert_eq!(meta.episode, 12);
    }

    #[test]
    fn missing_season_defaults_to_one() {
        let meta = extract("Mushishi/3.srt").unwrap();
        assert_eq!(meta.show, "Mushishi");
        assert_eq!(meta.season, DEFAULT_SEASON);
    }

    #[test]
    fn episode_zero_and_leading_zeros() {
        assert_eq!(extract("Show/0.srt").unwrap().episode, 0);
        assert_eq!(extract("Show/007.srt").unwrap().episode, 7);
    }

    #[test]
    fn nested_files_use_top_folder() {
        let meta = extract("Show (3)/extras/4.srt").unwrap();
        assert_eq!(meta.show, "Show");
        assert_eq!(meta.season, 3);
        assert_eq!(meta.episode, 4);
    }

    #[test]
    fn unusable_season_degrades_to_whole_name() {
        assert_eq!(
            parse_show_folder("(2)"),
            Some(("(2)".to_string(), DEFAULT_SEASON))
        );
        assert_eq!(
            parse_show_folder("Show (0)"),
            Some(("Show (0)".to_string(), DEFAULT_SEASON))
        );
        assert_eq!(
            parse_show_folder("Show (99999999999)"),
            Some(("Show (99999999999)".to_string(), DEFAULT_SEASON))
        );
    }

    #[test]
    fn parenthetical_must_be_at_the_end() {
        assert_eq!(
            parse_show_folder("Steins;Gate (2011) Remaster"),
            Some(("Steins;Gate (2011) Remaster".to_string(), DEFAULT_SEASON))
        );
    }

    #[test]
    fn blank_folder_is_unparseable() {
        assert_eq!(parse_show_folder("   "), None);
        assert!(matches!(
            extract("   /1.srt"),
            Err(Error::UnparseableShowFolder(_))
        ));
    }

    #[test]
    fn file_at_root_is_unparseable() {
        assert!(matches!(
            extract("1.srt"),
            Err(Error::UnparseableShowFolder(_))
        ));
    }

    #[test]
    fn non_numeric_episode_is_rejected() {
        assert!(matches!(
            extract("Show/opening.srt"),
            Err(Error::InvalidEpisodeName(_))
        ));
        assert!(matches!(
            extract("Show/-1.srt"),
            Err(Error::InvalidEpisodeName(_))
        ));
    }

    #[test]
    fn path_outside_root_is_not_found() {
        let err = extract_metadata(
            Path::new("/elsewhere/Show/1.srt"),
            Path::new("/corpus"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }
}
