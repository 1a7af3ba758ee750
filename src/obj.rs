use std::io::{ self, prelude::* };
use std::path::{ Path, PathBuf };
use std::fs::File;
use std::str::SplitWhitespace;

use log::{ debug, info, warn };

use crate::buffer::BoundedBuffer;
use crate::error::ObjError;
use crate::geometry::{ Triangle, Vertex };
use crate::tangent::compute_mesh_tangents;
use crate::tuple::{ Tuple2D, Tuple3D };

/// One corner of an OBJ face: 1-based position, texcoord and normal indices.
type ObjCorner = (usize, usize, usize);

/// A triangular face in an OBJ file, with the line it was read from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjFace {
    pub line: usize,
    pub corners: [ObjCorner; 3],
}

/// A parser for OBJ files.
///
/// Only the records needed by the tracer are understood: `v`, `vt`, `vn` and
/// triangular `f` faces with all three indices (`f 1/1/1 2/2/1 3/3/1`).
#[derive(Clone, Debug, Default)]
pub struct ObjParser {
    pub path: PathBuf,
    pub ignored_lines: usize,

    pub positions: Vec<Tuple3D>,
    pub texcoords: Vec<Tuple2D>,
    pub normals: Vec<Tuple3D>,
    pub faces: Vec<ObjFace>,
}

impl ObjParser {
    /// Creates a new `ObjParser` to parse the OBJ file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> ObjParser {
        ObjParser {
            path: path.as_ref().into(),
            ..Default::default()
        }
    }

    /// Parses the OBJ file at `self.path`.
    ///
    /// The file must have an `.obj` extension; anything else is rejected
    /// before the file is opened.
    pub fn parse(&mut self) -> Result<(), ObjError> {
        let is_obj = self.path.extension()
            .map_or(false, |ext| ext == "obj");
        if !is_obj {
            return Err(ObjError::UnsupportedExtension(self.path.clone()));
        }

        let obj_file = File::open(&self.path)?;
        self.parse_reader(io::BufReader::new(obj_file))
    }

    /// Parses OBJ records from any buffered reader.
    ///
    /// Unsupported commands are ignored. Each ignored line increments
    /// `ignored_lines` by 1. Malformed supported records abort parsing.
    pub fn parse_reader<R: BufRead>(&mut self, reader: R)
        -> Result<(), ObjError> {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            self.handle_command(number + 1, &line)?;
        }

        debug!("{:?}: {} positions, {} texcoords, {} normals, {} faces",
            self.path, self.positions.len(), self.texcoords.len(),
            self.normals.len(), self.faces.len());

        Ok(())
    }

    /// Parses OBJ records from a string.
    pub fn parse_str(&mut self, source: &str) -> Result<(), ObjError> {
        self.parse_reader(source.as_bytes())
    }

    /// Parses a line of an OBJ file.
    ///
    /// A sample OBJ file may look like the following:
    ///
    /// ```obj
    /// v -1 -1 0
    /// v 1 -1 0
    /// v 1 1 0
    /// vt 0 0
    /// vt 1 0
    /// vt 1 1
    /// vn 0 0 1
    ///
    /// f 1/1/1 2/2/1 3/3/1
    /// ```
    ///
    /// The first token of each line names the record, and the remaining
    /// tokens are its arguments. `v` is a position, `vt` a texture
    /// coordinate and `vn` a normal. `f` is a face whose corners are
    /// `position/texcoord/normal` triples of 1-based indices into the records
    /// read so far.
    fn handle_command(&mut self, number: usize, line: &str)
        -> Result<(), ObjError> {
        let mut params = line.split_whitespace();
        let record = match params.next() {
            Some(record) => record,

            // Ignore empty lines.
            None => return Ok(()),
        };

        match record {
            "v" => {
                let [x, y, z] = parse_floats::<3>(number, record, &mut params)?;
                self.positions.push(Tuple3D::new(x, y, z));
            },

            "vt" => {
                // An optional third `w` coordinate is allowed and dropped.
                let [u, v] = parse_floats::<2>(number, record, &mut params)?;
                self.texcoords.push(Tuple2D::new(u, v));
            },

            "vn" => {
                let [x, y, z] = parse_floats::<3>(number, record, &mut params)?;
                self.normals.push(Tuple3D::new(x, y, z));
            },

            "f" => {
                let corners: Vec<&str> = params.collect();
                if corners.len() != 3 {
                    return Err(ObjError::UnsupportedFace {
                        line: number,
                        corners: corners.len(),
                    });
                }

                let mut face = ObjFace { line: number, corners: [(0, 0, 0); 3] };
                for (slot, corner) in face.corners.iter_mut().zip(corners) {
                    *slot = parse_corner(number, corner)?;
                }

                self.faces.push(face);
            },

            // If this line has an unrecognized function, ignore it.
            _ => self.ignored_lines += 1,
        }

        Ok(())
    }

    /// Resolves every face into a triangle and computes tangents.
    ///
    /// Each face corner becomes its own vertex; vertices are never shared
    /// between triangles.
    pub fn triangles(&self) -> Result<Vec<Triangle>, ObjError> {
        let mut triangles = Vec::with_capacity(self.faces.len());

        for face in self.faces.iter() {
            let mut corners = [Vertex::default(); 3];
            for (vertex, &(p, t, n)) in corners.iter_mut().zip(face.corners.iter()) {
                *vertex = Vertex::new(
                    *lookup(&self.positions, p, "position", face.line)?,
                    *lookup(&self.texcoords, t, "texcoord", face.line)?,
                    *lookup(&self.normals, n, "normal", face.line)?,
                );
            }

            triangles.push(Triangle::new(corners[0], corners[1], corners[2]));
        }

        let degenerate = compute_mesh_tangents(&mut triangles);
        if degenerate > 0 {
            warn!("{:?}: {} triangles have a degenerate UV layout and \
                non-finite tangents", self.path, degenerate);
        }

        Ok(triangles)
    }
}

/// Loads the OBJ mesh at `path` and appends its triangles to `out`.
///
/// Returns the number of triangles added. Nothing is written if the mesh has
/// more than `max_triangles` triangles (`ObjError::Capacity`) or more than
/// `out` has room for (`ObjError::BufferFull`).
pub fn load_mesh<P: AsRef<Path>>(path: P, out: &mut BoundedBuffer<Triangle>,
    max_triangles: usize) -> Result<usize, ObjError> {
    let mut parser = ObjParser::new(path);
    parser.parse()?;

    let triangles = parser.triangles()?;
    if triangles.len() > max_triangles {
        return Err(ObjError::Capacity {
            triangles: triangles.len(),
            max: max_triangles,
        });
    }

    out.extend_from_slice(&triangles)?;
    info!("Loaded {} triangles from {:?}.", triangles.len(), parser.path);

    Ok(triangles.len())
}

fn parse_floats<const N: usize>(line: usize, record: &str,
    params: &mut SplitWhitespace<'_>) -> Result<[f32; N], ObjError> {
    let mut values = [0.0; N];

    for (i, value) in values.iter_mut().enumerate() {
        let token = params.next().ok_or_else(|| ObjError::MalformedRecord {
            line,
            record: record.into(),
            reason: format!("expected {} values, found {}", N, i),
        })?;

        *value = token.parse().map_err(|_| ObjError::MalformedRecord {
            line,
            record: record.into(),
            reason: format!("`{}` is not a number", token),
        })?;
    }

    Ok(values)
}

fn parse_corner(line: usize, corner: &str) -> Result<ObjCorner, ObjError> {
    let malformed = |reason: String| ObjError::MalformedRecord {
        line,
        record: "f".into(),
        reason,
    };

    let attributes: Vec<&str> = corner.split('/').collect();
    if attributes.len() != 3 {
        return Err(malformed(format!(
            "corner `{}` needs position/texcoord/normal indices", corner
        )));
    }

    let mut indices = [0; 3];
    for (index, attribute) in indices.iter_mut().zip(attributes) {
        *index = attribute.parse().map_err(|_| {
            malformed(format!("`{}` in corner `{}` is not an index",
                attribute, corner))
        })?;
    }

    Ok((indices[0], indices[1], indices[2]))
}

/// Looks up a 1-based OBJ index.
fn lookup<'a, T>(items: &'a [T], index: usize, kind: &'static str,
    line: usize) -> Result<&'a T, ObjError> {
    index.checked_sub(1)
        .and_then(|i| items.get(i))
        .ok_or(ObjError::IndexOutOfRange {
            line,
            kind,
            index,
            count: items.len(),
        })
}

#[test]
fn ignoring_unrecognized_lines() {
    let mut obj_parser = ObjParser::new("./models/gibberish.obj");
    obj_parser.parse().unwrap();

    assert_eq!(obj_parser.ignored_lines, 5);
    assert!(obj_parser.faces.is_empty());
}

#[test]
fn vertex_records() {
    let mut obj_parser = ObjParser::default();
    obj_parser.parse_str("\
v -1 1 0
v -1.0000 0.5000 0.0000
vt 0.25 0.75
vt 0.5 1.0 0.0
vn 0 0 1
vn 0.707 0 -0.707
").unwrap();

    assert_eq!(obj_parser.positions[0], Tuple3D::new(-1.0, 1.0, 0.0));
    assert_eq!(obj_parser.positions[1], Tuple3D::new(-1.0, 0.5, 0.0));
    assert_eq!(obj_parser.texcoords[0], Tuple2D::new(0.25, 0.75));
    assert_eq!(obj_parser.texcoords[1], Tuple2D::new(0.5, 1.0));
    assert_eq!(obj_parser.normals[1], Tuple3D::new(0.707, 0.0, -0.707));
    assert_eq!(obj_parser.ignored_lines, 0);
}

#[test]
fn faces_resolve_per_corner() {
    let mut obj_parser = ObjParser::new("./models/quad.obj");
    obj_parser.parse().unwrap();
    let triangles = obj_parser.triangles().unwrap();

    assert_eq!(triangles.len(), 2);

    let t2 = &triangles[1];
    assert_eq!(t2.v1.position, obj_parser.positions[0]);
    assert_eq!(t2.v2.position, obj_parser.positions[2]);
    assert_eq!(t2.v3.position, obj_parser.positions[3]);
    assert_eq!(t2.v3.texcoord, obj_parser.texcoords[3]);
    assert_eq!(t2.v3.normal, obj_parser.normals[0]);

    // Corners shared between the two faces are duplicated, not shared.
    assert_eq!(triangles[0].v1, triangles[1].v1);
}

#[test]
fn cube_tangents_are_unit_and_orthogonal() {
    let mut obj_parser = ObjParser::new("./models/cube.obj");
    obj_parser.parse().unwrap();
    let triangles = obj_parser.triangles().unwrap();

    assert_eq!(triangles.len(), 12);
    for t in triangles.iter() {
        for v in t.vertices().iter() {
            assert!(crate::feq(v.tangent.magnitude(), 1.0));
            assert!(crate::feq(v.tangent.dot(&v.normal), 0.0));
            assert!(v.handedness == 1.0 || v.handedness == -1.0);
        }
    }
}

#[test]
fn polygons_are_rejected() {
    let mut obj_parser = ObjParser::default();
    let result = obj_parser.parse_str("f 1/1/1 2/2/1 3/3/1 4/4/1\n");

    match result {
        Err(ObjError::UnsupportedFace { line: 1, corners: 4 }) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn short_records_are_malformed() {
    let mut obj_parser = ObjParser::default();
    let result = obj_parser.parse_str("v 1 2 3\nvn 0 1\n");

    match result {
        Err(ObjError::MalformedRecord { line: 2, ref record, .. })
            if record == "vn" => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn corners_need_all_three_indices() {
    let mut obj_parser = ObjParser::default();

    assert!(obj_parser.parse_str("f 1//1 2//1 3//1\n").is_err());
    assert!(obj_parser.parse_str("f 1 2 3\n").is_err());
}

#[test]
fn out_of_range_indices() {
    let mut obj_parser = ObjParser::default();
    obj_parser.parse_str("\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1/1 2/2/1 3/1/1
").unwrap();

    match obj_parser.triangles() {
        Err(ObjError::IndexOutOfRange { line: 6, kind: "texcoord", index: 2, count: 1 })
            => (),
        other => panic!("unexpected result {:?}", other),
    }

    let mut zero_index = ObjParser::default();
    zero_index.parse_str("v 0 0 0\nvt 0 0\nvn 0 0 1\nf 0/1/1 1/1/1 1/1/1\n")
        .unwrap();
    assert!(zero_index.triangles().is_err());
}

#[test]
fn extension_must_be_obj() {
    let mut obj_parser = ObjParser::new("./models/cube.txt");

    match obj_parser.parse() {
        Err(ObjError::UnsupportedExtension(_)) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn load_mesh_respects_capacity() {
    let mut out = BoundedBuffer::new(100);

    match load_mesh("./models/cube.obj", &mut out, 11) {
        Err(ObjError::Capacity { triangles: 12, max: 11 }) => (),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(out.is_empty());

    let mut small = BoundedBuffer::new(5);
    match load_mesh("./models/cube.obj", &mut small, 100) {
        Err(ObjError::BufferFull { triangles: 12, available: 5 }) => (),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(small.is_empty());

    assert_eq!(load_mesh("./models/cube.obj", &mut out, 12).unwrap(), 12);
    assert_eq!(out.len(), 12);
}
