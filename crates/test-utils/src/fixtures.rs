//! Common test fixtures for reforecast archive tests.
//!
//! Mirrors the layout of the public GEFSv12 reforecast bucket:
//! `{root}/{year}/{year}{MMDD}00/{member}/{horizon}/{variable}_{datecode}_{member}.grib2`

/// Bucket holding the reforecast archive
pub const BUCKET: &str = "noaa-gefs-retrospective";

/// Key prefix of the archive within the bucket
pub const ROOT_PREFIX: &str = "GEFSv12/reforecast";

pub const HORIZON: &str = "Days:1-10";
pub const VARIABLE: &str = "pres_msl";

/// Index of a real control-member file, first four messages.
pub mod sample {
    pub const INDEX_URI: &str = "s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/2000011200/c00/Days:1-10/pres_msl_2000011200_c00.grib2.idx";

    pub const BINARY_URI: &str = "s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/2000011200/c00/Days:1-10/pres_msl_2000011200_c00.grib2";

    pub const INDEX: &str = "\
1:0:d=2000011200:PRMSL:mean sea level:3 hour fcst:ENS=low-res ctl
2:1061203:d=2000011200:PRMSL:mean sea level:6 hour fcst:ENS=low-res ctl
3:2111079:d=2000011200:PRMSL:mean sea level:9 hour fcst:ENS=low-res ctl
4:3163942:d=2000011200:PRMSL:mean sea level:12 hour fcst:ENS=low-res ctl
";

    /// Binary size matching [`INDEX`]
    pub const FILE_SIZE: u64 = 4_214_006;
}

/// Message sizes used by the synthetic archive files.
pub const MESSAGE_SIZES: [u64; 4] = [100, 120, 110, 130];
