//! `orderer` package: ordering-service parameters and raft metadata.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSize {
    #[prost(uint32, tag = "1")]
    pub max_message_count: u32,
    #[prost(uint32, tag = "2")]
    pub absolute_max_bytes: u32,
    #[prost(uint32, tag = "3")]
    pub preferred_max_bytes: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchTimeout {
    #[prost(string, tag = "1")]
    pub timeout: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusType {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub metadata: Vec<u8>,
    #[prost(enumeration = "ConsensusState", tag = "3")]
    pub state: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConsensusState {
    Normal = 0,
    Maintenance = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KafkaBrokers {
    #[prost(string, repeated, tag = "1")]
    pub brokers: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelRestrictions {
    #[prost(uint64, tag = "1")]
    pub max_count: u64,
}

pub mod etcdraft {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ConfigMetadata {
        #[prost(message, repeated, tag = "1")]
        pub consenters: Vec<Consenter>,
        #[prost(message, optional, tag = "2")]
        pub options: Option<Options>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Consenter {
        #[prost(string, tag = "1")]
        pub host: String,
        #[prost(uint32, tag = "2")]
        pub port: u32,
        #[prost(bytes = "vec", tag = "3")]
        pub client_tls_cert: Vec<u8>,
        #[prost(bytes = "vec", tag = "4")]
        pub server_tls_cert: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Options {
        #[prost(string, tag = "1")]
        pub tick_interval: String,
        #[prost(uint32, tag = "2")]
        pub election_tick: u32,
        #[prost(uint32, tag = "3")]
        pub heartbeat_tick: u32,
        #[prost(uint32, tag = "4")]
        pub max_inflight_blocks: u32,
        #[prost(uint32, tag = "5")]
        pub snapshot_interval_size: u32,
    }
}
