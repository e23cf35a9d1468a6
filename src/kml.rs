//! Streaming output of the few KML elements needed to display tracks.
//!
//! Tracks can hold thousands of cloud elements, so rather than building a document in memory each
//! element is written out as soon as it is started. That means the caller is responsible for
//! closing every element it opens.

use crate::{geo::BoundingBox, MccResult};
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// A KML document, it is closed when this is dropped.
pub struct KmlFile<W: Write>(W);

impl KmlFile<BufWriter<File>> {
    pub fn new<P: AsRef<Path>>(pth: P) -> MccResult<Self> {
        let f = File::create(pth.as_ref())?;
        Self::from_writer(BufWriter::new(f))
    }
}

impl<W: Write> KmlFile<W> {
    /// Start a document on any output.
    pub fn from_writer(out: W) -> MccResult<Self> {
        let mut new = KmlFile(out);
        new.start_document()?;
        Ok(new)
    }
}

impl<W: Write> KmlWriter for KmlFile<W> {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.0
    }
}

impl<W: Write> Drop for KmlFile<W> {
    fn drop(&mut self) {
        self.finish_document();
        let _ = self.0.flush();
    }
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Put out the XML header and open the document.
    fn start_document(&mut self) -> MccResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;
        Ok(())
    }

    /// Close the document.
    fn finish_document(&mut self) {
        const FOOTER: &str = concat!("</Document>\n", "</kml>\n");
        let _ = self.output().write_all(FOOTER.as_bytes());
    }

    fn write_description(&mut self, description: &str) -> MccResult<()> {
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    fn start_folder(&mut self, name: Option<&str>, description: Option<&str>) -> MccResult<()> {
        writeln!(self.output(), "<Folder>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        Ok(())
    }

    fn finish_folder(&mut self) -> MccResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> MccResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    fn finish_placemark(&mut self) -> MccResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /**
     * Define a shared style for lines and polygons.
     *
     * Colors are KML `aabbggrr` hex strings.
     */
    fn create_style(
        &mut self,
        style_id: &str,
        line_color: &str,
        line_width: f64,
        poly_color: &str,
    ) -> MccResult<()> {
        writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        writeln!(
            self.output(),
            "<LineStyle><color>{}</color><width>{}</width></LineStyle>",
            line_color,
            line_width
        )?;
        writeln!(
            self.output(),
            "<PolyStyle><color>{}</color><fill>1</fill><outline>1</outline></PolyStyle>",
            poly_color
        )?;
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    fn timespan(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> MccResult<()> {
        writeln!(
            self.output(),
            "<TimeSpan><begin>{}</begin><end>{}</end></TimeSpan>",
            start.format("%Y-%m-%dT%H:%M:%SZ"),
            end.format("%Y-%m-%dT%H:%M:%SZ")
        )?;
        Ok(())
    }

    fn start_multi_geometry(&mut self) -> MccResult<()> {
        writeln!(self.output(), "<MultiGeometry>")?;
        Ok(())
    }

    fn finish_multi_geometry(&mut self) -> MccResult<()> {
        writeln!(self.output(), "</MultiGeometry>")?;
        Ok(())
    }

    fn create_point(&mut self, lat: f64, lon: f64) -> MccResult<()> {
        writeln!(
            self.output(),
            "<Point><coordinates>{},{},0</coordinates></Point>",
            lon,
            lat
        )?;
        Ok(())
    }

    /// Write a LineString through `(lat, lon)` vertices.
    fn create_line_string(&mut self, vertices: &[(f64, f64)]) -> MccResult<()> {
        writeln!(self.output(), "<LineString>\n<tessellate>1</tessellate>\n<coordinates>")?;
        for (lat, lon) in vertices {
            writeln!(self.output(), "{},{},0", lon, lat)?;
        }
        writeln!(self.output(), "</coordinates>\n</LineString>")?;
        Ok(())
    }

    /// Write the outline of a latitude-longitude box as a closed polygon.
    fn create_box_polygon(&mut self, bbox: &BoundingBox) -> MccResult<()> {
        let BoundingBox { ll, ur } = bbox;

        writeln!(self.output(), "<Polygon>\n<tessellate>1</tessellate>")?;
        writeln!(
            self.output(),
            "<outerBoundaryIs>\n<LinearRing>\n<coordinates>"
        )?;

        for (lat, lon) in [
            (ll.lat, ll.lon),
            (ll.lat, ur.lon),
            (ur.lat, ur.lon),
            (ur.lat, ll.lon),
            (ll.lat, ll.lon),
        ] {
            writeln!(self.output(), "{},{},0", lon, lat)?;
        }

        writeln!(
            self.output(),
            "</coordinates>\n</LinearRing>\n</outerBoundaryIs>\n</Polygon>"
        )?;
        Ok(())
    }
}
