/// Counters accumulated over one ingest cycle.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub sources_polled: u32,
    pub items_fetched: u32,
    pub duplicates_skipped: u32,
    pub signals_stored: u32,
    pub signals_accepted: u32,
    pub signals_rejected: u32,
    pub signals_failed: u32,
    pub signals_deferred: u32,
    pub signals_clustered: u32,
    pub clustering_deferred: u32,
    pub clusters_swept: u64,
    pub clusters_rescored: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingest Cycle Complete ===")?;
        writeln!(f, "Sources polled:     {}", self.sources_polled)?;
        writeln!(f, "Items fetched:      {}", self.items_fetched)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Signals stored:     {}", self.signals_stored)?;
        writeln!(f, "Accepted:           {}", self.signals_accepted)?;
        writeln!(f, "Rejected:           {}", self.signals_rejected)?;
        writeln!(f, "Failed:             {}", self.signals_failed)?;
        writeln!(f, "Deferred (budget):  {}", self.signals_deferred + self.clustering_deferred)?;
        writeln!(f, "Clustered:          {}", self.signals_clustered)?;
        writeln!(f, "Clusters swept:     {}", self.clusters_swept)?;
        write!(f, "Clusters rescored:  {}", self.clusters_rescored)
    }
}
