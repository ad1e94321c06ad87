//! Geo command family: built directly on the sorted-set geohash
//! index, not a distinct kind.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::geo::GeoUnit;

impl Dispatcher {
    pub(crate) fn cmd_geoadd(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 4 || (args_in.len() - 1) % 3 != 0 {
            return args::arity_err("GEOADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut members = Vec::new();
        for chunk in args_in[1..].chunks(3) {
            let lon = match args::float(&chunk[0]) {
                Some(v) => v,
                None => return CoreError::NotAFloat.into(),
            };
            let lat = match args::float(&chunk[1]) {
                Some(v) => v,
                None => return CoreError::NotAFloat.into(),
            };
            let member = args::bytes(&chunk[2]).unwrap_or_default();
            members.push((member, lon, lat));
        }
        match self.engine().geo_add(&key, &members) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_geopos(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("GEOPOS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut out = Vec::new();
        for member in args_in[1..].iter().filter_map(args::bytes) {
            match self.engine().geo_pos(&key, &member) {
                Ok(Some((lon, lat))) => out.push(RespValue::Array(vec![
                    RespValue::bulk_string(lon.to_string()),
                    RespValue::bulk_string(lat.to_string()),
                ])),
                Ok(None) => out.push(RespValue::null()),
                Err(e) => return e.into(),
            }
        }
        RespValue::Array(out)
    }

    pub(crate) fn cmd_geodist(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("GEODIST");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let m1 = args::bytes(&args_in[1]).unwrap_or_default();
        let m2 = args::bytes(&args_in[2]).unwrap_or_default();
        let unit = match args_in.get(3).and_then(args::string) {
            Some(u) => match GeoUnit::parse(&u) {
                Ok(u) => u,
                Err(e) => return e.into(),
            },
            None => GeoUnit::Meters,
        };
        match self.engine().geo_dist(&key, &m1, &m2, unit) {
            Ok(Some(d)) => RespValue::bulk_string(d.to_string()),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_geosearch(&self, args_in: &[RespValue]) -> RespValue {
        // GEOSEARCH key FROMLONLAT lon lat BYRADIUS radius unit
        if args_in.len() < 6 {
            return args::arity_err("GEOSEARCH");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut i = 1;
        let (lon, lat) = if args::upper(&args_in[i]).as_deref() == Some("FROMLONLAT") {
            i += 1;
            let lon = args_in.get(i).and_then(args::float).unwrap_or(0.0);
            i += 1;
            let lat = args_in.get(i).and_then(args::float).unwrap_or(0.0);
            i += 1;
            (lon, lat)
        } else {
            return CoreError::Syntax.into();
        };
        if args_in.get(i).and_then(args::upper).as_deref() != Some("BYRADIUS") {
            return CoreError::Syntax.into();
        }
        i += 1;
        let radius = match args_in.get(i).and_then(args::float) {
            Some(r) => r,
            None => return CoreError::NotAFloat.into(),
        };
        i += 1;
        let unit = match args_in.get(i).and_then(args::string) {
            Some(u) => match GeoUnit::parse(&u) {
                Ok(u) => u,
                Err(e) => return e.into(),
            },
            None => GeoUnit::Meters,
        };
        match self.engine().geo_search(&key, lon, lat, radius, unit) {
            Ok(results) => RespValue::Array(
                results
                    .into_iter()
                    .map(|(member, dist)| {
                        RespValue::Array(vec![RespValue::bulk_string(member), RespValue::bulk_string(dist.to_string())])
                    })
                    .collect(),
            ),
            Err(e) => e.into(),
        }
    }
}
