use std::{collections::BTreeSet, fmt};

/// Optional constraints on the episode a matching cue comes from. Empty
/// sets impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub include_shows: Vec<String>,
    pub exclude_shows: Vec<String>,
    pub seasons: Vec<u32>,
    pub episodes: Vec<u32>,
}

/// One node of a query plan. A plan matches a document when every one of
/// its predicates does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The document has a posting for this normalized token.
    HasToken(String),
    ShowIn(BTreeSet<String>),
    ShowNotIn(BTreeSet<String>),
    SeasonIn(BTreeSet<u32>),
    EpisodeIn(BTreeSet<u32>),
}

/// Which slice of the ordered matches to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let items = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }
}

/// A conjunctive lookup over the index.
///
/// Plans hold tokens and filter values as data; the storage layer turns
/// each predicate into index lookups keyed by those values.
///
/// # Examples
///
/// ```
/// use subsearch::query::{QueryPlan, SearchFilters};
///
/// let filters = SearchFilters {
///     seasons: vec![2],
///     ..Default::default()
/// };
/// let plan = QueryPlan::new(["元気".to_string()], &filters);
/// assert_eq!(plan.to_string(), "has(元気) AND season IN {2}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    predicates: Vec<Predicate>,
    window: Window,
}

impl QueryPlan {
    /// Build a plan from already normalized tokens. Duplicate tokens are
    /// collapsed; empty filter sets are left out.
    pub fn new(
        tokens: impl IntoIterator<Item = String>,
        filters: &SearchFilters,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let mut predicates: Vec<Predicate> = tokens
            .into_iter()
            .filter(|token| seen.insert(token.clone()))
            .map(Predicate::HasToken)
            .collect();

        if !filters.include_shows.is_empty() {
            predicates.push(Predicate::ShowIn(
                filters.include_shows.iter().cloned().collect(),
            ));
        }
        if !filters.exclude_shows.is_empty() {
            predicates.push(Predicate::ShowNotIn(
                filters.exclude_shows.iter().cloned().collect(),
            ));
        }
        if !filters.seasons.is_empty() {
            predicates.push(Predicate::SeasonIn(
                filters.seasons.iter().copied().collect(),
            ));
        }
        if !filters.episodes.is_empty() {
            predicates.push(Predicate::EpisodeIn(
                filters.episodes.iter().copied().collect(),
            ));
        }

        Self {
            predicates,
            window: Window::default(),
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// The distinct tokens every match must contain.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().filter_map(|p| match p {
            Predicate::HasToken(token) => Some(token.as_str()),
            _ => None,
        })
    }

    /// A plan without tokens matches nothing; it never degrades to a scan
    /// of the whole index.
    pub fn is_empty(&self) -> bool {
        self.tokens().next().is_none()
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "nothing");
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::HasToken(token) => write!(f, "has({token})"),
            Predicate::ShowIn(shows) => {
                write!(f, "show IN ")?;
                write_set(f, shows.iter().map(|s| format!("{s:?}")))
            }
            Predicate::ShowNotIn(shows) => {
                write!(f, "show NOT IN ")?;
                write_set(f, shows.iter().map(|s| format!("{s:?}")))
            }
            Predicate::SeasonIn(seasons) => {
                write!(f, "season IN ")?;
                write_set(f, seasons.iter().map(u32::to_string))
            }
            Predicate::EpisodeIn(episodes) => {
                write!(f, "episode IN ")?;
                write_set(f, episodes.iter().map(u32::to_string))
            }
        }
    }
}

fn write_set(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = String>,
) -> fmt::Result {
    let items: Vec<String> = items.collect();
    write!(f, "{{{}}}", items.join(", "))
}
