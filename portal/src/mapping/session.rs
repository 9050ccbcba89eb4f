//! Caller-owned state for one uploaded portfolio.
//!
//! The session holds what a page would otherwise keep in component fields:
//! the parsed rows, the current mapping and the last applied result. Every
//! scoring request gets a generation number and only the response to the
//! newest request is applied.

use uuid::Uuid;

use super::{propose_mapping, rank_candidates, Candidate, Mapping};
use crate::api::logs::{log_info, log_warning};
use crate::error::{MappingError, MappingResult};
use crate::models::{columns_of, Record, ScoringRequest, ScoringResponse, ScoringSettings, TargetSchema};
use crate::transform::payload::{build_request, grouping_options};

/// Handle for one in-flight scoring request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub generation: u64,
}

/// State of one upload: rows, mapping, results.
#[derive(Debug, Clone)]
pub struct PortfolioSession {
    id: Uuid,
    schema: TargetSchema,
    threshold: f64,
    portfolio: Vec<Record>,
    columns: Vec<String>,
    mapping: Mapping,
    generation: u64,
    response: Option<ScoringResponse>,
}

impl PortfolioSession {
    pub fn new(schema: TargetSchema, threshold: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema,
            threshold,
            portfolio: Vec::new(),
            columns: Vec::new(),
            mapping: Mapping::default(),
            generation: 0,
            response: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    pub fn portfolio(&self) -> &[Record] {
        &self.portfolio
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn response(&self) -> Option<&ScoringResponse> {
        self.response.as_ref()
    }

    /// Replace the portfolio with freshly parsed rows.
    ///
    /// The mapping is proposed from scratch; earlier overrides and results
    /// are dropped.
    pub fn load(&mut self, rows: Vec<Record>) -> &Mapping {
        self.columns = columns_of(&rows);
        self.portfolio = rows;
        self.mapping = propose_mapping(&self.columns, self.schema.fields(), self.threshold);
        self.response = None;

        log_info(format!(
            "Proposed mapping for {} columns ({} mapped)",
            self.columns.len(),
            self.mapping.mapped().count()
        ));
        &self.mapping
    }

    /// Override the target of one column; `None` leaves it unmapped.
    pub fn override_target(&mut self, column: &str, target: Option<&str>) -> MappingResult<()> {
        match target {
            Some(target) => {
                if !self.schema.contains(target) {
                    return Err(MappingError::UnknownTarget(target.to_string()));
                }
                self.mapping.assign(column, target)
            }
            None => self.mapping.clear(column),
        }
    }

    /// Replace the whole mapping, e.g. with one edited in a browser.
    ///
    /// Entries are checked like individual overrides; on error the current
    /// mapping is left unchanged.
    pub fn replace_mapping(&mut self, mapping: &Mapping) -> MappingResult<()> {
        let mut next = Mapping::unmapped(self.columns.iter().cloned());
        for (column, target) in mapping.iter() {
            if let Some(target) = target {
                if !self.schema.contains(target) {
                    return Err(MappingError::UnknownTarget(target.to_string()));
                }
                next.assign(column, target)?;
            }
        }
        self.mapping = next;
        Ok(())
    }

    /// Targets ranked for one column, for override suggestions.
    pub fn suggestions(&self, column: &str) -> Vec<Candidate> {
        rank_candidates(column, self.schema.fields())
    }

    /// Grouping choices: `available` plus every unmapped column.
    pub fn grouping_options(&self, available: &[String]) -> Vec<String> {
        grouping_options(available, &self.mapping)
    }

    /// Build the next request and tag it with a new generation.
    pub fn prepare_request(&mut self, settings: &ScoringSettings) -> (RequestTicket, ScoringRequest) {
        self.generation += 1;
        let ticket = RequestTicket {
            generation: self.generation,
        };
        let request = build_request(&self.portfolio, &self.mapping, settings);
        log_info(format!(
            "Request #{}: {} companies, method {}",
            ticket.generation,
            request.companies.len(),
            settings.aggregation_method
        ));
        (ticket, request)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Store a response if it answers the newest request.
    ///
    /// Returns `false` and keeps the previous result for stale tickets.
    pub fn apply_response(&mut self, ticket: RequestTicket, response: ScoringResponse) -> bool {
        if !self.is_current(ticket) {
            log_warning(format!(
                "Ignoring response for request #{} (latest is #{})",
                ticket.generation, self.generation
            ));
            return false;
        }
        self.response = Some(response);
        true
    }
}
