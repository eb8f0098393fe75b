//! The shared data source every view reads from.

/// A query change that views must recompute for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryUpdate {
    /// Generation assigned to the new query.
    pub generation: u64,
    /// The new query.
    pub query: String,
}

/// The data source's current query and its generation.
///
/// Each change bumps the generation; results computed for an older
/// generation describe a superseded filter and must be ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSource {
    query: String,
    generation: u64,
}

impl DataSource {
    /// Replaces the query. Returns `None` when `query` equals the current
    /// one, so an unchanged filter never re-issues a request.
    pub fn set_query(&mut self, query: String) -> Option<QueryUpdate> {
        if self.generation > 0 && query == self.query {
            log::debug!("Query unchanged at generation {}", self.generation);
            return None;
        }
        self.generation += 1;
        self.query = query;
        log::info!("Data source query generation {}", self.generation);
        Some(QueryUpdate {
            generation: self.generation,
            query: self.query.clone(),
        })
    }

    /// The current query; empty before the first [`Self::set_query`].
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The current generation; `0` before the first query.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` if `generation` is the latest one.
    #[must_use]
    pub const fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}
