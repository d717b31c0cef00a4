use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug, Default)]
pub struct Config {
    /// When set, the traffic-source annotation collaborator is never
    /// invoked and the traffic-source fields stay unset.
    #[envconfig(default = "false")]
    pub disable_traffic_source_enrichment: bool,
}
