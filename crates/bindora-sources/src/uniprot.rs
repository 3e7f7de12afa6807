//! UniProt sequence lookup.
//!
//! API: https://rest.uniprot.org/uniprotkb/search
//! Entries that come back without an inline sequence are completed from
//! `/uniprotkb/{accession}.fasta`. Target annotation uses the same search
//! endpoint with the comment and GO fields selected.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use bindora_common::{retry_with_backoff, BindoraError, GuardedClient, Result, RetryPolicy, TargetInfo};

use crate::SequenceSource;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(rename = "primaryAccession")]
    primary_accession: Option<String>,
    sequence: Option<SequenceField>,
}

#[derive(Debug, Deserialize)]
struct SequenceField {
    value: Option<String>,
}

const SEQUENCE_FIELDS: &str = "accession,sequence";
const INFO_FIELDS: &str =
    "accession,protein_name,gene_names,organism_name,length,cc_function,cc_subcellular_location,go,cc_disease";

// ── Annotation response ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    results: Vec<InfoEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoEntry {
    primary_accession: Option<String>,
    protein_description: Option<ProteinDescription>,
    #[serde(default)]
    genes: Vec<Gene>,
    organism: Option<Organism>,
    sequence: Option<SequenceLength>,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default, rename = "uniProtKBCrossReferences")]
    cross_references: Vec<CrossReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProteinDescription {
    recommended_name: Option<RecommendedName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedName {
    full_name: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gene {
    gene_name: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organism {
    scientific_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SequenceLength {
    length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Comment {
    comment_type: String,
    #[serde(default)]
    texts: Vec<TextValue>,
    #[serde(default)]
    subcellular_locations: Vec<SubcellularLocation>,
    disease: Option<Disease>,
}

#[derive(Debug, Deserialize)]
struct SubcellularLocation {
    location: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Disease {
    disease_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossReference {
    database: String,
    id: String,
    #[serde(default)]
    properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
struct Property {
    key: String,
    value: String,
}

impl InfoEntry {
    /// `None` for an entry without an accession.
    fn into_target_info(self) -> Option<TargetInfo> {
        let accession = self.primary_accession?;
        let comments = |kind: &'static str| self.comments.iter().filter(move |c| c.comment_type == kind);

        let function = comments("FUNCTION")
            .flat_map(|c| c.texts.iter())
            .map(|t| t.value.trim().to_string())
            .find(|t| !t.is_empty());
        let mut subcellular_locations: Vec<String> = comments("SUBCELLULAR LOCATION")
            .flat_map(|c| c.subcellular_locations.iter())
            .filter_map(|l| l.location.as_ref().map(|v| v.value.clone()))
            .collect();
        subcellular_locations.dedup();
        let diseases = comments("DISEASE")
            .filter_map(|c| c.disease.as_ref()?.disease_id.clone())
            .collect();
        let go_terms = self
            .cross_references
            .iter()
            .filter(|x| x.database == "GO")
            .map(|x| {
                match x.properties.iter().find(|p| p.key == "GoTerm") {
                    Some(term) => format!("{} {}", x.id, term.value),
                    None => x.id.clone(),
                }
            })
            .collect();

        Some(TargetInfo {
            accession,
            name: self
                .protein_description
                .and_then(|d| d.recommended_name)
                .and_then(|n| n.full_name)
                .map(|v| v.value),
            gene: self.genes.into_iter().find_map(|g| g.gene_name.map(|v| v.value)),
            organism: self.organism.and_then(|o| o.scientific_name),
            sequence_length: self.sequence.and_then(|s| s.length),
            function,
            subcellular_locations,
            go_terms,
            diseases,
        })
    }
}

/// UniProtKB accession shape: six or ten characters, letter first, digit
/// second and last.
pub fn is_accession(id: &str) -> bool {
    let bytes = id.as_bytes();
    matches!(bytes.len(), 6 | 10)
        && bytes.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        && bytes[0].is_ascii_uppercase()
        && bytes[1].is_ascii_digit()
        && bytes[bytes.len() - 1].is_ascii_digit()
}

/// Strip FASTA headers and anything that is not a letter; uppercase the rest.
pub fn parse_fasta(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .flat_map(|line| line.chars())
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub struct UniProtSource {
    client: GuardedClient,
    base_url: String,
    organism_id: String,
    retry: RetryPolicy,
}

impl UniProtSource {
    pub fn new(client: GuardedClient, base_url: &str, organism_id: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            organism_id: organism_id.to_string(),
            retry,
        }
    }

    pub fn search_url(&self, query: &str, size: usize) -> Result<String> {
        self.search_url_with_fields(query, SEQUENCE_FIELDS, size)
    }

    fn search_url_with_fields(&self, query: &str, fields: &str, size: usize) -> Result<String> {
        let size = size.to_string();
        Url::parse_with_params(
            &format!("{}/uniprotkb/search", self.base_url),
            &[
                ("query", query),
                ("fields", fields),
                ("size", size.as_str()),
                ("format", "json"),
            ],
        )
        .map(String::from)
        .map_err(|e| BindoraError::Config(format!("Invalid UniProt URL: {}", e)))
    }

    pub fn gene_query(&self, symbol: &str) -> String {
        format!("gene_exact:{} AND organism_id:{}", symbol.trim(), self.organism_id)
    }

    /// Accessions are looked up directly; anything else as a gene symbol.
    pub fn info_query(&self, id: &str) -> String {
        let id = id.trim();
        if is_accession(id) {
            format!("accession:{}", id)
        } else {
            self.gene_query(id)
        }
    }

    pub fn disease_query(&self, name: &str) -> String {
        format!(
            "disease:\"{}\" AND organism_id:{} AND reviewed:true",
            name.trim().replace('"', ""),
            self.organism_id
        )
    }

    async fn search(&self, query: &str, size: usize) -> Result<Vec<SearchEntry>> {
        let url = self.search_url(query, size)?;
        let url = url.as_str();
        let client = &self.client;
        let body: Option<SearchResponse> = retry_with_backoff(&self.retry, "uniprot search", move || async move {
            client.get_json(url).await
        })
        .await?;
        Ok(body.map(|b| b.results).unwrap_or_default())
    }

    async fn search_info(&self, query: &str) -> Result<Vec<InfoEntry>> {
        let url = self.search_url_with_fields(query, INFO_FIELDS, 1)?;
        let url = url.as_str();
        let client = &self.client;
        let body: Option<InfoResponse> = retry_with_backoff(&self.retry, "uniprot annotation", move || async move {
            client.get_json(url).await
        })
        .await?;
        Ok(body.map(|b| b.results).unwrap_or_default())
    }

    async fn fetch_fasta(&self, accession: &str) -> Result<Option<String>> {
        let url = format!("{}/uniprotkb/{}.fasta", self.base_url, accession);
        let url = url.as_str();
        let client = &self.client;
        let text = retry_with_backoff(&self.retry, "uniprot fasta", move || async move {
            client.get_text(url).await
        })
        .await?;
        Ok(text.map(|t| parse_fasta(&t)).filter(|s| !s.is_empty()))
    }

    /// Inline sequence, or the FASTA record when the entry carries none.
    async fn entry_sequence(&self, entry: &SearchEntry) -> Result<Option<String>> {
        let inline = entry
            .sequence
            .as_ref()
            .and_then(|s| s.value.as_deref())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if inline.is_some() {
            return Ok(inline);
        }
        match &entry.primary_accession {
            Some(accession) => {
                debug!(accession = %accession, "No inline sequence, fetching FASTA");
                self.fetch_fasta(accession).await
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SequenceSource for UniProtSource {
    #[instrument(skip(self))]
    async fn fetch_by_gene(&self, symbol: &str) -> Result<Option<String>> {
        let entries = self.search(&self.gene_query(symbol), 1).await?;
        match entries.first() {
            Some(entry) => self.entry_sequence(entry).await,
            None => {
                debug!("Gene not found in UniProt");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch_by_disease(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        let entries = self.search(&self.disease_query(name), limit).await?;
        let mut sequences = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.entry_sequence(entry).await {
                Ok(Some(seq)) => sequences.push(seq),
                Ok(None) => {}
                Err(e) => warn!(
                    accession = entry.primary_accession.as_deref().unwrap_or("?"),
                    error = %e,
                    "Dropping disease target without a retrievable sequence"
                ),
            }
        }
        debug!(found = sequences.len(), "Resolved disease targets");
        Ok(sequences)
    }

    #[instrument(skip(self))]
    async fn fetch_target_info(&self, id: &str) -> Result<Option<TargetInfo>> {
        let entries = self.search_info(&self.info_query(id)).await?;
        let info = entries.into_iter().find_map(InfoEntry::into_target_info);
        if info.is_none() {
            debug!("No UniProt annotation");
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source() -> UniProtSource {
        let client = GuardedClient::new(Duration::from_secs(5)).unwrap();
        UniProtSource::new(client, "https://rest.uniprot.org/", "9606", RetryPolicy::none())
    }

    #[test]
    fn test_parse_fasta() {
        let fasta = ">sp|P01116|RASK_HUMAN GTPase KRas\nMTEYKLVVVG\nagGVGKSALT 42\n";
        assert_eq!(parse_fasta(fasta), "MTEYKLVVVGAGGVGKSALT");
        assert_eq!(parse_fasta(">header only\n"), "");
    }

    #[test]
    fn test_search_url_encodes_query() {
        let src = source();
        let url = src.search_url(&src.gene_query("KRAS"), 1).unwrap();
        assert!(url.starts_with("https://rest.uniprot.org/uniprotkb/search?"));
        assert!(url.contains("query=gene_exact%3AKRAS+AND+organism_id%3A9606"));
        assert!(url.contains("fields=accession%2Csequence"));
        assert!(url.contains("size=1"));
    }

    #[test]
    fn test_disease_query_strips_quotes() {
        let src = source();
        assert_eq!(
            src.disease_query(" breast \"cancer\" "),
            "disease:\"breast cancer\" AND organism_id:9606 AND reviewed:true"
        );
    }

    #[test]
    fn test_search_response_decoding() {
        let body = r#"{"results":[
            {"primaryAccession":"P01116","sequence":{"value":"MTEYKLVVVG","length":10}},
            {"primaryAccession":"P04637"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(
            parsed.results[0].sequence.as_ref().and_then(|s| s.value.as_deref()),
            Some("MTEYKLVVVG")
        );
        assert!(parsed.results[1].sequence.is_none());
    }

    const INFO_BODY: &str = r#"{"results":[{
        "primaryAccession":"P01116",
        "organism":{"scientificName":"Homo sapiens","taxonId":9606},
        "proteinDescription":{"recommendedName":{"fullName":{"value":"GTPase KRas"}}},
        "genes":[{"geneName":{"value":"KRAS"}}],
        "sequence":{"length":189},
        "comments":[
            {"commentType":"FUNCTION","texts":[{"value":"Ras proteins bind GDP/GTP and possess intrinsic GTPase activity."}]},
            {"commentType":"SUBCELLULAR LOCATION","subcellularLocations":[
                {"location":{"value":"Cell membrane"}},{"location":{"value":"Cytoplasm"}}]},
            {"commentType":"DISEASE","disease":{"diseaseId":"Noonan syndrome 3"}},
            {"commentType":"DISEASE","note":{"texts":[]}}
        ],
        "uniProtKBCrossReferences":[
            {"database":"GO","id":"GO:0005525","properties":[{"key":"GoTerm","value":"F:GTP binding"}]},
            {"database":"GO","id":"GO:0005886"},
            {"database":"PDB","id":"4OBE"}
        ]
    }]}"#;

    #[test]
    fn test_annotation_decoding() {
        let parsed: InfoResponse = serde_json::from_str(INFO_BODY).unwrap();
        let info = parsed.results.into_iter().next().unwrap().into_target_info().unwrap();
        assert_eq!(info.accession, "P01116");
        assert_eq!(info.name.as_deref(), Some("GTPase KRas"));
        assert_eq!(info.gene.as_deref(), Some("KRAS"));
        assert_eq!(info.organism.as_deref(), Some("Homo sapiens"));
        assert_eq!(info.sequence_length, Some(189));
        assert!(info.function.unwrap().starts_with("Ras proteins"));
        assert_eq!(info.subcellular_locations, vec!["Cell membrane", "Cytoplasm"]);
        assert_eq!(info.diseases, vec!["Noonan syndrome 3"]);
        assert_eq!(info.go_terms, vec!["GO:0005525 F:GTP binding", "GO:0005886"]);
    }

    #[test]
    fn test_annotation_without_accession_dropped() {
        let parsed: InfoResponse = serde_json::from_str(r#"{"results":[{"genes":[]}]}"#).unwrap();
        assert!(parsed.results.into_iter().next().unwrap().into_target_info().is_none());
    }

    #[test]
    fn test_info_query_picks_accession_or_gene() {
        let src = source();
        assert_eq!(src.info_query("P01116"), "accession:P01116");
        assert_eq!(src.info_query("A0A024RBG1"), "accession:A0A024RBG1");
        assert_eq!(src.info_query("KRAS"), "gene_exact:KRAS AND organism_id:9606");
        assert_eq!(src.info_query("TP53"), "gene_exact:TP53 AND organism_id:9606");
        assert!(!is_accession("p01116"));
    }

    #[tokio::test]
    async fn test_inline_sequence_needs_no_request() {
        let src = source();
        let entry = SearchEntry {
            primary_accession: Some("P01116".into()),
            sequence: Some(SequenceField { value: Some(" MTEYK ".into()) }),
        };
        assert_eq!(src.entry_sequence(&entry).await.unwrap(), Some("MTEYK".into()));

        let bare = SearchEntry { primary_accession: None, sequence: None };
        assert_eq!(src.entry_sequence(&bare).await.unwrap(), None);
    }
}
