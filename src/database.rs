use crate::{
    cloud_element::{CeCatalog, CeId, CloudElement, CoreDescriptor, Edge, GridBox, NodeTable, PrecipStats},
    error::StoreError,
    geo::{BoundingBox, Coord},
    graph::CeGraph,
    MccResult,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::info;
use rusqlite::{Connection, OpenFlags, ToSql};
use std::path::Path;

const INTERVAL_KEY: &str = "interval_seconds";
const CELL_AREA_KEY: &str = "cell_area_km2";

/// Represents a connection to the database where the results of a cloud element search are kept.
///
/// The store holds the node table, the unpruned graph, and the frame times, which is everything
/// needed to prune and classify again without reading any imagery.
pub struct CeDatabase {
    conn: Connection,
}

impl CeDatabase {
    /// Open a connection to the database, creating it if it does not exist.
    ///
    /// The path `:memory:` gives a database that only lives as long as the connection.
    pub fn connect<P: AsRef<Path>>(path: P) -> MccResult<Self> {
        let path = path.as_ref();

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // A 5-second busy time out is WAY too much. If we hit this something has gone terribly wrong.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(CeDatabase { conn })
    }

    /// Replace the contents of the database with a catalog.
    pub fn store(&self, catalog: &CeCatalog) -> MccResult<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;

        match self.store_all(catalog) {
            Ok(()) => {
                self.conn.execute("COMMIT", [])?;
                info!(
                    "stored {} cloud elements and {} edges",
                    catalog.nodes.len(),
                    catalog.graph.edge_count()
                );
                Ok(())
            }
            Err(err) => {
                let _ = self.conn.execute("ROLLBACK", []);
                Err(err)
            }
        }
    }

    fn store_all(&self, catalog: &CeCatalog) -> MccResult<()> {
        self.conn
            .execute_batch(include_str!("database/clear_db.sql"))?;

        let mut meta_stmt = self
            .conn
            .prepare(include_str!("database/add_metadata.sql"))?;
        meta_stmt.execute([
            &INTERVAL_KEY as &dyn ToSql,
            &(catalog.interval.num_seconds() as f64),
        ])?;
        meta_stmt.execute([&CELL_AREA_KEY as &dyn ToSql, &catalog.cell_area_km2])?;

        let mut frame_stmt = self.conn.prepare(include_str!("database/add_frame.sql"))?;
        for (frame, time) in catalog.times.iter().enumerate() {
            let is_empty = catalog.empty_frames.binary_search(&frame).is_ok();
            frame_stmt.execute([
                &(frame as i64) as &dyn ToSql,
                &time.timestamp(),
                &is_empty,
            ])?;
        }

        let mut node_stmt = self.conn.prepare(include_str!("database/add_node.sql"))?;
        for ce in catalog.nodes.iter() {
            let precip_total = ce.precipitation.map(|p| p.total_volume);
            let precip_max_rate = ce.precipitation.map(|p| p.max_rate);
            let precip_min_rate = ce.precipitation.map(|p| p.min_rate);
            let precip_area = ce.precipitation.map(|p| p.raining_area_km2);
            let pixels = serialize_pixels(&ce.pixels);
            let core_pixels = serialize_pixels(&ce.core.pixels);

            node_stmt.execute([
                &ce.id.frame as &dyn ToSql,
                &ce.id.component,
                &ce.time.timestamp(),
                &ce.area_km2,
                &ce.centroid.lat,
                &ce.centroid.lon,
                &ce.min_temperature,
                &ce.mean_temperature,
                &ce.max_temperature,
                &ce.grid_box.row_min,
                &ce.grid_box.row_max,
                &ce.grid_box.col_min,
                &ce.grid_box.col_max,
                &ce.bounds.ll.lat,
                &ce.bounds.ll.lon,
                &ce.bounds.ur.lat,
                &ce.bounds.ur.lon,
                &ce.core.area_km2,
                &ce.core.min_temperature,
                &ce.core.mean_temperature,
                &ce.core.major_extent_km,
                &ce.core.minor_extent_km,
                &ce.core.eccentricity,
                &precip_total,
                &precip_max_rate,
                &precip_min_rate,
                &precip_area,
                &pixels,
                &core_pixels,
            ])?;
        }

        let mut edge_stmt = self.conn.prepare(include_str!("database/add_edge.sql"))?;
        for (parent, child, edge) in catalog.graph.edges() {
            edge_stmt.execute([
                &parent.frame as &dyn ToSql,
                &parent.component,
                &child.frame,
                &child.component,
                &edge.parent_fraction,
                &edge.child_fraction,
                &edge.overlap_km2,
            ])?;
        }

        Ok(())
    }

    /// Load a catalog back out of the database.
    ///
    /// Every stored cloud element comes back as a node of the graph, so a catalog that was pruned
    /// before it was stored loads with the pruned nodes back in place as isolated nodes.
    pub fn load(&self) -> MccResult<CeCatalog> {
        let interval_seconds = self.metadata(INTERVAL_KEY)?.ok_or(StoreError {
            msg: "no frame interval in the database",
        })?;
        let cell_area_km2 = self.metadata(CELL_AREA_KEY)?.ok_or(StoreError {
            msg: "no cell area in the database",
        })?;

        let mut times = vec![];
        let mut empty_frames = vec![];
        let mut stmt = self.conn.prepare(include_str!("database/query_frames.sql"))?;
        let rows = stmt.query_and_then([], |row| -> MccResult<(usize, DateTime<Utc>, bool)> {
            let frame: i64 = row.get(0)?;
            let time = timestamp_to_datetime(row.get(1)?);
            let is_empty: bool = row.get(2)?;
            Ok((usize::try_from(frame)?, time, is_empty))
        })?;

        for row in rows {
            let (frame, time, is_empty) = row?;
            if frame != times.len() {
                return Err(StoreError {
                    msg: "frames in the database are not contiguous",
                }
                .into());
            }

            times.push(time);
            if is_empty {
                empty_frames.push(frame);
            }
        }

        let mut nodes = NodeTable::new();
        let mut graph = CeGraph::new();

        let mut stmt = self.conn.prepare(include_str!("database/query_nodes.sql"))?;
        for ce in stmt.query_and_then([], row_to_cloud_element)? {
            let ce = ce?;
            graph.add_node(ce.id);
            nodes.insert(ce);
        }

        let mut stmt = self.conn.prepare(include_str!("database/query_edges.sql"))?;
        let rows = stmt.query_and_then([], |row| -> MccResult<(CeId, CeId, Edge)> {
            let parent = CeId::new(row.get(0)?, row.get(1)?);
            let child = CeId::new(row.get(2)?, row.get(3)?);
            let edge = Edge {
                parent_fraction: row.get(4)?,
                child_fraction: row.get(5)?,
                overlap_km2: row.get(6)?,
            };
            Ok((parent, child, edge))
        })?;

        for row in rows {
            let (parent, child, edge) = row?;
            if !graph.contains(parent) || !graph.contains(child) {
                return Err(StoreError {
                    msg: "edge refers to an unknown cloud element",
                }
                .into());
            }

            if !graph.add_edge(parent, child, edge) {
                return Err(StoreError {
                    msg: "edge does not join consecutive frames",
                }
                .into());
            }
        }

        info!(
            "loaded {} frames, {} cloud elements and {} edges",
            times.len(),
            nodes.len(),
            graph.edge_count()
        );

        Ok(CeCatalog {
            nodes,
            graph,
            times,
            interval: Duration::seconds(interval_seconds as i64),
            cell_area_km2,
            empty_frames,
        })
    }

    fn metadata(&self, key: &str) -> MccResult<Option<f64>> {
        let mut stmt = self
            .conn
            .prepare(include_str!("database/query_metadata.sql"))?;
        let mut rows = stmt.query([key])?;

        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_utc(NaiveDateTime::from_timestamp(timestamp, 0), Utc)
}

/// SQLite stores NaN as NULL, so read it back that way.
fn get_f64(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn row_to_cloud_element(row: &rusqlite::Row) -> MccResult<CloudElement> {
    let id = CeId::new(row.get(0)?, row.get(1)?);
    let time = timestamp_to_datetime(row.get(2)?);

    let precip_total: Option<f64> = row.get(23)?;
    let precip_max_rate: Option<f64> = row.get(24)?;
    let precip_min_rate: Option<f64> = row.get(25)?;
    let precip_area: Option<f64> = row.get(26)?;
    let precipitation = match (precip_total, precip_max_rate, precip_min_rate, precip_area) {
        (Some(total_volume), Some(max_rate), Some(min_rate), Some(raining_area_km2)) => {
            Some(PrecipStats {
                total_volume,
                max_rate,
                min_rate,
                raining_area_km2,
            })
        }
        _ => None,
    };

    let pixels = match row.get_ref(27)? {
        rusqlite::types::ValueRef::Blob(bytes) => deserialize_pixels(bytes),
        _ => Err(StoreError {
            msg: "Invalid type in pixels column",
        }),
    }?;

    let core_pixels = match row.get_ref(28)? {
        rusqlite::types::ValueRef::Blob(bytes) => deserialize_pixels(bytes),
        _ => Err(StoreError {
            msg: "Invalid type in core_pixels column",
        }),
    }?;

    Ok(CloudElement {
        id,
        time,
        pixels,
        area_km2: row.get(3)?,
        centroid: Coord {
            lat: row.get(4)?,
            lon: row.get(5)?,
        },
        min_temperature: get_f64(row, 6)?,
        mean_temperature: get_f64(row, 7)?,
        max_temperature: get_f64(row, 8)?,
        grid_box: GridBox {
            row_min: row.get(9)?,
            row_max: row.get(10)?,
            col_min: row.get(11)?,
            col_max: row.get(12)?,
        },
        bounds: BoundingBox {
            ll: Coord {
                lat: row.get(13)?,
                lon: row.get(14)?,
            },
            ur: Coord {
                lat: row.get(15)?,
                lon: row.get(16)?,
            },
        },
        core: CoreDescriptor {
            pixels: core_pixels,
            area_km2: row.get(17)?,
            min_temperature: get_f64(row, 18)?,
            mean_temperature: get_f64(row, 19)?,
            major_extent_km: row.get(20)?,
            minor_extent_km: row.get(21)?,
            eccentricity: row.get(22)?,
        },
        precipitation,
    })
}

/// Pixel indexes as little endian `u32` values.
fn serialize_pixels(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

fn deserialize_pixels(bytes: &[u8]) -> Result<Vec<u32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError {
            msg: "pixel list has a partial value",
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
