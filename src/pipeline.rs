/*!
The build pipeline: load, then derive the layers in a fixed order.

```text
Input -> Phy -> Ip -> Ospf -> Isis -> Bgp
```

`Pipeline` owns the model while it is being built and runs one stage per `step`. A failing
stage stops the build; the overlays registered by earlier stages stay as they were.
`Build` is the one-call entry point: it picks a loader, applies the fallback hook to the
configuration and runs every stage.
*/

use std::{fmt::Display, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    collaborators::{
        CollaboratorError, DegreeReflectorAllocator, InputExpander, IpAllocator, NullPublisher,
        RouteReflectorAllocator, SequentialAllocator, SnapshotPublisher,
    },
    config::{BuildConfig, ConfigError},
    layers::{self, DeriveError},
    load::{LinkListLoader, LoadError, LoaderChain},
    network::{AbstractNetworkModel, Overlay},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Phy,
    Ip,
    Ospf,
    Isis,
    Bgp,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Input,
        Stage::Phy,
        Stage::Ip,
        Stage::Ospf,
        Stage::Isis,
        Stage::Bgp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Phy => "phy",
            Stage::Ip => "ip",
            Stage::Ospf => "ospf",
            Stage::Isis => "isis",
            Stage::Bgp => "bgp",
        }
    }

    pub fn next(self) -> Option<Stage> {
        let position = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(position + 1).copied()
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Could not set up the build: {0}")]
    Setup(#[from] CollaboratorError),
    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: DeriveError,
    },
    #[error("Stage {requested} requested, but the next stage is {expected}")]
    OutOfOrder { expected: Stage, requested: Stage },
    #[error("Build already finished")]
    Finished,
}

/// The pluggable parts of a build.
pub struct Collaborators {
    pub ip_allocator: Box<dyn IpAllocator>,
    pub route_reflectors: Box<dyn RouteReflectorAllocator>,
    pub expander: Option<Box<dyn InputExpander>>,
    pub publisher: Box<dyn SnapshotPublisher>,
}

impl Collaborators {
    /// Default collaborators for `config`. Snapshots go nowhere until a publisher is plugged in.
    pub fn from_config(config: &BuildConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            ip_allocator: Box::new(SequentialAllocator::from_config(&config.ip)?),
            route_reflectors: Box::new(DegreeReflectorAllocator::new(
                config.bgp.route_reflectors_per_asn,
            )),
            expander: None,
            publisher: Box::new(NullPublisher),
        })
    }

    pub fn with_publisher(mut self, publisher: Box<dyn SnapshotPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_expander(mut self, expander: Box<dyn InputExpander>) -> Self {
        self.expander = Some(expander);
        self
    }
}

pub struct Pipeline {
    anm: AbstractNetworkModel,
    config: BuildConfig,
    collaborators: Collaborators,
    pending_input: Option<Overlay>,
    next: Option<Stage>,
}

impl Pipeline {
    pub fn new(input: Overlay, config: BuildConfig, collaborators: Collaborators) -> Self {
        Self {
            anm: AbstractNetworkModel::new(),
            config,
            collaborators,
            pending_input: Some(input),
            next: Some(Stage::Input),
        }
    }

    pub fn anm(&self) -> &AbstractNetworkModel {
        &self.anm
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The stage `step` would run, `None` once the build is complete.
    pub fn next_stage(&self) -> Option<Stage> {
        self.next
    }

    /// Runs `stage`, which must be the next one.
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), BuildError> {
        match self.next {
            Some(expected) if expected != stage => Err(BuildError::OutOfOrder {
                expected,
                requested: stage,
            }),
            Some(_) => self.step().map(|_| ()),
            None => Err(BuildError::Finished),
        }
    }

    /// Runs the next stage and returns it.
    pub fn step(&mut self) -> Result<Stage, BuildError> {
        let stage = self.next.ok_or(BuildError::Finished)?;
        self.derive(stage)
            .map_err(|source| BuildError::Stage { stage, source })?;
        self.next = stage.next();

        let sizes: Vec<String> = self
            .anm
            .overlay_names()
            .filter_map(|name| Some(format!("{name}={}", self.anm.overlay(name).ok()?.len())))
            .collect();
        info!("stage {stage} done ({})", sizes.join(", "));

        if self.config.is_checkpoint(stage) {
            self.collaborators.publisher.publish(stage, &self.anm);
        }
        Ok(stage)
    }

    fn derive(&mut self, stage: Stage) -> Result<(), DeriveError> {
        let anm = &mut self.anm;
        match stage {
            Stage::Input => {
                // kept until prepared so a failed Input stage can be retried
                let input = self.pending_input.clone().unwrap_or_default();
                layers::prepare_input(
                    anm,
                    input,
                    self.collaborators.expander.as_deref(),
                    &self.config.syntax,
                )?;
                self.pending_input = None;
                layers::build_graphics(anm)
            }
            Stage::Phy => layers::build_phy(anm),
            Stage::Ip => layers::build_ip(anm, self.collaborators.ip_allocator.as_ref()),
            Stage::Ospf => layers::build_ospf(anm),
            Stage::Isis => layers::build_isis(anm),
            Stage::Bgp => layers::build_bgp(
                anm,
                self.config.bgp.full_mesh_threshold,
                self.collaborators.route_reflectors.as_ref(),
            ),
        }
    }

    pub fn run_to_end(mut self) -> Result<BuildOutput, BuildError> {
        while self.next.is_some() {
            self.step()?;
        }
        Ok(BuildOutput {
            anm: self.anm,
            config: self.config,
        })
    }
}

/// A finished model and the configuration it was built with, fallback adjustments included.
#[derive(Debug)]
pub struct BuildOutput {
    pub anm: AbstractNetworkModel,
    pub config: BuildConfig,
}

type FallbackHook = Box<dyn Fn(&mut BuildConfig) + Send + Sync>;

/// One-call build: load `path`, then run every stage.
pub struct Build {
    config: BuildConfig,
    loaders: LoaderChain,
    collaborators: Option<Collaborators>,
    on_fallback: FallbackHook,
}

impl Build {
    /// Node-link JSON first, link lists as the fallback; a fallback load forces local
    /// deployment.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            loaders: LoaderChain::default().with_fallback(Box::new(LinkListLoader)),
            collaborators: None,
            on_fallback: Box::new(BuildConfig::force_local_deployment),
        }
    }

    pub fn loaders(mut self, loaders: LoaderChain) -> Self {
        self.loaders = loaders;
        self
    }

    /// Collaborators to use instead of `Collaborators::from_config`.
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    pub fn on_fallback(mut self, hook: impl Fn(&mut BuildConfig) + Send + Sync + 'static) -> Self {
        self.on_fallback = Box::new(hook);
        self
    }

    pub fn run(self, path: &Path) -> Result<BuildOutput, BuildError> {
        let mut config = self.config;
        config.validate()?;

        let loaded = self.loaders.load(path)?;
        if loaded.used_fallback {
            warn!("{} needed the fallback loader, adjusting configuration", path.display());
            (self.on_fallback)(&mut config);
        }
        let collaborators = match self.collaborators {
            Some(collaborators) => collaborators,
            None => Collaborators::from_config(&config)?,
        };
        Pipeline::new(loaded.input, config, collaborators).run_to_end()
    }
}

/// `Build::new(config).run(path)`.
pub fn build(path: &Path, config: BuildConfig) -> Result<BuildOutput, BuildError> {
    Build::new(config).run(path)
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::atomic::{AtomicBool, Ordering},
    };

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        collaborators::ChannelPublisher,
        layers::AddressError,
        load::NodeLinkLoader,
        network::{
            AttrValue, Edge,
            node::NodeId,
            predicate::{attr, edge_attr_eq, is_router},
        },
    };

    fn fixture() -> Overlay {
        NodeLinkLoader
            .parse(include_str!("../test_data/small_topology.json"))
            .unwrap()
    }

    fn id(label: &str) -> NodeId {
        NodeId::for_device(label)
    }

    fn run(config: BuildConfig) -> AbstractNetworkModel {
        let collaborators = Collaborators::from_config(&config).unwrap();
        Pipeline::new(fixture(), config, collaborators)
            .run_to_end()
            .unwrap()
            .anm
    }

    fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Input.next(), Some(Stage::Phy));
        assert_eq!(Stage::Isis.next(), Some(Stage::Bgp));
        assert_eq!(Stage::Bgp.next(), None);
        assert_eq!(Stage::Ospf.to_string(), "ospf");
    }

    #[test]
    fn test_all_overlays_registered() {
        let anm = run(BuildConfig::default());
        assert_eq!(
            anm.overlay_names().collect::<Vec<_>>(),
            vec!["phy", "input", "graphics", "ip", "ospf", "isis", "bgp"]
        );
        let r1 = id("r1");
        assert_eq!(
            anm.node(r1).overlays(),
            vec!["phy", "input", "graphics", "ip", "ospf", "isis", "bgp"]
        );
        // two ASNs
        assert_eq!(anm.node_label(r1), "r1.1");
    }

    #[test]
    fn test_input_preparation() {
        let anm = run(BuildConfig::default());
        let input = anm.overlay("input").unwrap();
        assert_eq!(input.get(id("r1"), "syntax"), Some(&AttrValue::from("quagga")));
        assert_eq!(input.get(id("r4"), "syntax"), None);
        assert_eq!(anm.overlay("phy").unwrap().get(id("r1"), "syntax"), Some(&AttrValue::from("quagga")));
    }

    #[test]
    fn test_phy_layer() {
        let anm = run(BuildConfig::default());
        let phy = anm.overlay("phy").unwrap();
        assert_eq!(phy.len(), 6);
        assert_eq!(phy.edge_count(), 6);
        assert_eq!(phy.get(id("r1"), "x"), None);
        assert_eq!(phy.get(id("r1"), "host"), Some(&AttrValue::from("h1")));
    }

    #[test]
    fn test_ip_collision_domains() {
        let anm = run(BuildConfig::default());
        let ip = anm.overlay("ip").unwrap();

        let domains: Vec<NodeId> = ip.nodes(&attr("collision_domain")).collect();
        // sw1 plus one per router-to-router link after folding sw1
        assert_eq!(domains.len(), 7);
        assert_eq!(ip.len(), 12);
        assert!(ip.all_edges().all(|e| ip.is(e.src, "collision_domain") != ip.is(e.dst, "collision_domain")));

        assert_eq!(ip.get(id("sw1"), "cd_id"), Some(&AttrValue::Int(0)));
        assert!(ip.neighbors(id("sw1")).is_empty());

        let r1_r2 = domains
            .iter()
            .copied()
            .find(|cd| ip.get(*cd, "label") == Some(&AttrValue::from("cd_r1_r2")))
            .unwrap();
        assert_eq!(ip.get(r1_r2, "cd_id"), Some(&AttrValue::from("cd_r1_r2")));
        assert_eq!(ip.get(r1_r2, "host"), Some(&AttrValue::from("h1")));
        assert_eq!(ip.get(r1_r2, "asn"), Some(&AttrValue::Int(1)));

        let graphics = anm.overlay("graphics").unwrap();
        assert_eq!(graphics.get(r1_r2, "x"), Some(&AttrValue::Float(50.0)));
        assert_eq!(graphics.get(r1_r2, "y"), Some(&AttrValue::Float(0.0)));
        assert_eq!(graphics.get(r1_r2, "label"), Some(&AttrValue::from("cd_r1_r2")));
        assert_eq!(
            graphics.get(id("sw1"), "device_type"),
            Some(&AttrValue::from("collision_domain"))
        );
    }

    #[test]
    fn test_ip_inter_as_domain() {
        let anm = run(BuildConfig::default());
        let ip = anm.overlay("ip").unwrap();
        let cd = ip
            .nodes(&attr("collision_domain"))
            .find(|cd| ip.get(*cd, "label") == Some(&AttrValue::from("cd_r2_r4")))
            .unwrap();
        // tie between asn 1 and 2 goes to the first neighbor, r2
        assert_eq!(ip.get(cd, "asn"), Some(&AttrValue::Int(1)));
        // h1 and h2
        assert_eq!(ip.get(cd, "host"), None);
        assert!(ip.get(cd, "subnet").is_some());
    }

    #[test]
    fn test_ip_addresses_unique() {
        let anm = run(BuildConfig::default());
        let ip = anm.overlay("ip").unwrap();
        let loopbacks: Vec<String> = ip
            .nodes(&is_router())
            .map(|r| ip.get(r, "loopback").unwrap().to_string())
            .collect();
        assert_eq!(loopbacks.len(), 5);
        assert_eq!(loopbacks[0], "192.168.128.1");
        let mut distinct = loopbacks.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 5);

        let mut interfaces: Vec<String> = ip
            .all_edges()
            .map(|e| ip.edge_get(&e, "ip_address").unwrap().to_string())
            .collect();
        interfaces.sort();
        interfaces.dedup();
        assert_eq!(interfaces.len(), ip.edge_count());
    }

    #[test]
    fn test_igp_layers() {
        let anm = run(BuildConfig::default());
        let ospf = anm.overlay("ospf").unwrap();
        assert_eq!(ospf.len(), 6);
        // the r2-r4 link crosses AS 1 / AS 2
        assert_eq!(ospf.edge_count(), 5);
        assert!(ospf.all_edges().all(|e| ospf.get(e.src, "asn") == ospf.get(e.dst, "asn")));
        assert!(ospf.all_edges().all(|e| {
            ospf.edge_get(&e, "area") == Some(&AttrValue::Int(0))
                && ospf.edge_get(&e, "cost") == Some(&AttrValue::Int(1))
        }));
        assert_eq!(ospf.neighbors(id("sw1")).len(), 3);

        let isis = anm.overlay("isis").unwrap();
        assert_eq!(isis.edge_count(), 5);
        assert_eq!(
            isis.get(id("r1"), "net"),
            Some(&AttrValue::from("49.1921.6812.8001.00"))
        );
        assert_eq!(isis.get(id("sw1"), "net"), None);
    }

    #[test]
    fn test_bgp_route_reflectors() {
        let anm = run(BuildConfig::default());
        let bgp = anm.overlay("bgp").unwrap();
        assert!(bgp.is_directed());
        assert_eq!(bgp.len(), 5);

        let ebgp: Vec<Edge> = bgp.edges(&edge_attr_eq("type", "ebgp")).collect();
        assert_eq!(ebgp.len(), 2);
        assert!(bgp.is(id("r2"), "ebgp"));
        assert!(bgp.is(id("r4"), "ebgp"));
        assert!(!bgp.is(id("r1"), "ebgp"));

        // 6 nodes in phy, at or above the full mesh threshold of 5
        assert!(bgp.is(id("r2"), "route_reflector"));
        assert!(bgp.is(id("r1"), "route_reflector"));
        assert!(!bgp.is(id("r3"), "route_reflector"));
        assert_eq!(bgp.edges(&edge_attr_eq("type", "ibgp")).count(), 6 + 2);
    }

    #[test]
    fn test_bgp_full_mesh_below_threshold() {
        let mut config = BuildConfig::default();
        config.bgp.full_mesh_threshold = 10;
        let anm = run(config);
        let bgp = anm.overlay("bgp").unwrap();
        assert_eq!(bgp.nodes(&attr("route_reflector")).count(), 0);
        // 3 * 2 sessions in AS 1, 2 * 1 in AS 2
        assert_eq!(bgp.edges(&edge_attr_eq("type", "ibgp")).count(), 8);
        assert_eq!(bgp.neighbors(id("r3")), vec![id("r1"), id("r2")]);
    }

    #[test]
    fn test_config_file_drives_build() {
        let config = BuildConfig::from_toml_str(include_str!("../test_data/build.toml")).unwrap();
        let anm = run(config);
        let ip = anm.overlay("ip").unwrap();
        assert_eq!(
            ip.get(id("r1"), "loopback").map(AttrValue::to_string),
            Some("192.168.0.1".to_string())
        );
        let bgp = anm.overlay("bgp").unwrap();
        // one reflector per AS
        assert_eq!(bgp.nodes(&attr("route_reflector")).collect::<Vec<_>>(), vec![id("r2"), id("r4")]);
        assert_eq!(bgp.edges(&edge_attr_eq("type", "ibgp")).count(), 6);
    }

    #[test]
    fn test_builds_are_reproducible() {
        let first = serde_json::to_string(&run(BuildConfig::default())).unwrap();
        let second = serde_json::to_string(&run(BuildConfig::default())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_order_stage() {
        let config = BuildConfig::default();
        let collaborators = Collaborators::from_config(&config).unwrap();
        let mut pipeline = Pipeline::new(fixture(), config, collaborators);
        assert!(matches!(
            pipeline.run_stage(Stage::Ip),
            Err(BuildError::OutOfOrder { expected: Stage::Input, requested: Stage::Ip })
        ));
        pipeline.run_stage(Stage::Input).unwrap();
        pipeline.run_stage(Stage::Phy).unwrap();
        assert_eq!(pipeline.next_stage(), Some(Stage::Ip));
        assert!(!pipeline.anm().has_overlay("ip"));
    }

    struct NoAddresses;

    impl IpAllocator for NoAddresses {
        fn allocate_ips(&self, _ip: &mut Overlay) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_loopback_stops_isis() {
        let config = BuildConfig::default();
        let mut collaborators = Collaborators::from_config(&config).unwrap();
        collaborators.ip_allocator = Box::new(NoAddresses);
        let mut pipeline = Pipeline::new(fixture(), config, collaborators);
        for _ in 0..4 {
            pipeline.step().unwrap();
        }
        let err = pipeline.step().unwrap_err();
        assert!(matches!(
            err,
            BuildError::Stage {
                stage: Stage::Isis,
                source: DeriveError::InvalidAddress { source: AddressError::InvalidAddress(_), .. },
            }
        ));
        assert!(pipeline.anm().has_overlay("ospf"));
        assert!(!pipeline.anm().has_overlay("isis"));
        assert_eq!(pipeline.next_stage(), Some(Stage::Isis));
    }

    /// Fails the first expansion only.
    struct FlakyExpander {
        failed: AtomicBool,
    }

    impl InputExpander for FlakyExpander {
        fn expand(&self, _input: &mut Overlay) -> Result<(), CollaboratorError> {
            if self.failed.swap(true, Ordering::SeqCst) {
                Ok(())
            } else {
                Err(CollaboratorError::Expansion("transient".to_string()))
            }
        }
    }

    #[test]
    fn test_input_stage_retry_keeps_topology() {
        let config = BuildConfig::default();
        let collaborators = Collaborators::from_config(&config)
            .unwrap()
            .with_expander(Box::new(FlakyExpander { failed: AtomicBool::new(false) }));
        let mut pipeline = Pipeline::new(fixture(), config, collaborators);

        let err = pipeline.step().unwrap_err();
        assert!(matches!(
            err,
            BuildError::Stage {
                stage: Stage::Input,
                source: DeriveError::Collaborator(CollaboratorError::Expansion(_)),
            }
        ));
        assert!(!pipeline.anm().has_overlay("input"));
        assert_eq!(pipeline.next_stage(), Some(Stage::Input));

        assert_eq!(pipeline.step().unwrap(), Stage::Input);
        assert_eq!(pipeline.anm().overlay("input").unwrap().len(), 6);
        let output = pipeline.run_to_end().unwrap();
        assert_eq!(output.anm.overlay("phy").unwrap().len(), 6);
        assert_eq!(output.anm.overlay("bgp").unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_snapshots_at_checkpoints() {
        let mut config = BuildConfig::default();
        config.snapshot.enabled = true;
        config.snapshot.checkpoints = vec![Stage::Phy, Stage::Bgp];
        let (publisher, mut receiver) = ChannelPublisher::channel();
        let collaborators = Collaborators::from_config(&config)
            .unwrap()
            .with_publisher(Box::new(publisher));
        let output = Pipeline::new(fixture(), config, collaborators).run_to_end().unwrap();
        drop(output);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.stage, Stage::Phy);
        let body: serde_json::Value = serde_json::from_str(&first.body).unwrap();
        assert!(body.get("ip").is_none());
        assert_eq!(receiver.recv().await.unwrap().stage, Stage::Bgp);
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_fallback_load_forces_local_deployment() {
        let file = temp_file(
            ".txt",
            "node r1 router 1\nnode r2 router 1\nnode r3 router 2\nlink r1 r2\nlink r2 r3\n",
        );
        let output = build(file.path(), BuildConfig::default()).unwrap();
        assert!(output.config.general.deploy);
        assert!(output.config.deploy_hosts["internal"]["cisco"].deploy);
        assert_eq!(output.anm.overlay("bgp").unwrap().len(), 3);

        let file = temp_file(".json", include_str!("../test_data/small_topology.json"));
        let output = build(file.path(), BuildConfig::default()).unwrap();
        assert!(!output.config.general.deploy);
    }
}
