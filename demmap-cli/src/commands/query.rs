use anyhow::Result;
use serde::Serialize;

use super::EngineArgs;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tile: Option<String>,
}

pub fn run(args: &EngineArgs, lat: f64, lon: f64, json: bool) -> Result<()> {
    let engine = args.engine()?;

    let elevation = engine.elevation(lat, lon);
    let tile = engine
        .index()
        .find_tile(demmap::GeoCoord::new(lat, lon))
        .map(|d| d.path.clone());

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation,
            tile,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(elev) => println!("{}", elev),
            None => println!("no data"),
        }
    }

    Ok(())
}
