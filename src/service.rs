//! Ticket service: the request pipeline behind the htsget endpoints.
//!
//! Raw query parameters are validated here, then the query flows through the
//! [`RangeResolver`], the [`LocationResolver`] and the [`ResponseAssembler`].

use crate::index::{Accession, AccessionKey};
use crate::location::LocationResolver;
use crate::logging::LogDetails;
use crate::range::{RangeQuery, RangeResolver};
use crate::response::ResponseAssembler;
use crate::types::{DataClass, Format, HtsgetResponse, TicketParams};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// The htsget endpoint a ticket was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Reads,
    Variants,
}

impl Endpoint {
    pub fn default_format(&self) -> Format {
        match self {
            Endpoint::Reads => Format::Bam,
            Endpoint::Variants => Format::Vcf,
        }
    }

    pub fn accepts(&self, format: Format) -> bool {
        match self {
            Endpoint::Reads => format.is_reads(),
            Endpoint::Variants => format.is_variants(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Endpoint::Reads => "reads",
            Endpoint::Variants => "variants",
        }
    }
}

pub struct TicketService {
    resolver: RangeResolver,
    locations: LocationResolver,
    assembler: ResponseAssembler,
}

impl TicketService {
    pub fn new(
        resolver: RangeResolver,
        locations: LocationResolver,
        assembler: ResponseAssembler,
    ) -> Self {
        Self {
            resolver,
            locations,
            assembler,
        }
    }

    /// Build the query a ticket request describes.
    pub fn parse_query(
        endpoint: Endpoint,
        namespace: &str,
        accession: &str,
        params: &TicketParams,
    ) -> Result<RangeQuery> {
        let format = match params.format.as_deref() {
            None => endpoint.default_format(),
            Some(raw) => Format::parse(raw)
                .filter(|f| endpoint.accepts(*f))
                .ok_or_else(|| {
                    Error::UnsupportedFormat(format!(
                        "{} is not a {} format",
                        raw,
                        endpoint.name()
                    ))
                })?,
        };

        let class = params
            .class
            .as_deref()
            .map(|raw| {
                DataClass::parse(raw)
                    .ok_or_else(|| Error::InvalidQuery(format!("unknown class {}", raw)))
            })
            .transpose()?;

        if params.reference_name.as_deref() == Some("") {
            return Err(Error::InvalidQuery("empty referenceName".to_string()));
        }

        let query = RangeQuery {
            accession: AccessionKey::new(namespace, accession, format),
            reference_name: params.reference_name.clone(),
            start: parse_coordinate("start", params.start.as_deref())?,
            end: parse_coordinate("end", params.end.as_deref())?,
            class,
        };
        query.validate()?;
        Ok(query)
    }

    pub async fn ticket(
        &self,
        endpoint: Endpoint,
        namespace: &str,
        accession: &str,
        params: TicketParams,
        details: &mut LogDetails,
    ) -> Result<HtsgetResponse> {
        let query = Self::parse_query(endpoint, namespace, accession, &params)?;
        details.add("accession", &query.accession);
        if let Some(reference_name) = &query.reference_name {
            details.add("referenceName", reference_name);
        }

        let resolution = self.resolver.resolve(&query).await?;
        if let Some(index) = &resolution.accession.index {
            details.add("reference", &index.reference_genome);
        }
        details.add("ranges", resolution.range.ranges().len());

        let location = self.locations.resolve(&resolution.accession).await?;
        let response = self
            .assembler
            .assemble(&resolution.accession, &resolution.range, &location);
        details.add("urls", response.htsget.urls.len());
        Ok(response)
    }

    /// A locally stored accession and its checked path, for the data endpoint.
    pub async fn local_file(&self, key: &AccessionKey) -> Result<(Arc<Accession>, PathBuf)> {
        let accession = self.resolver.store().get_accession(key).await?;
        let path = self.locations.local_path(&accession).await?;
        Ok((accession, path))
    }
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<Option<u64>> {
    raw.map(|value| {
        value.parse::<u64>().map_err(|_| {
            Error::InvalidQuery(format!("{} must be a non-negative integer, got {}", name, value))
        })
    })
    .transpose()
}
