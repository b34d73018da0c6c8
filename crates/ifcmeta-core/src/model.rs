use crate::encoding;
use crate::error::{IfcError, Result};
use crate::io;
use crate::step::{self, HeaderEntry, Record};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// Attribute position of `Name` on every `IfcRoot` subtype
/// (`GlobalId`, `OwnerHistory`, `Name`, ...).
pub const ROOT_NAME_INDEX: usize = 2;

/// An IFC-SPF file held in memory with a record index over it.
///
/// Edits are kept as byte-range replacements and only applied when the model
/// is written, so every byte outside an edited attribute is preserved.
#[derive(Debug)]
pub struct IfcModel {
    source: Vec<u8>,
    header: Vec<HeaderEntry>,
    records: Vec<Record>,
    /// Start offset → (end offset, replacement bytes). Ranges never overlap.
    edits: BTreeMap<usize, (usize, Vec<u8>)>,
}

/// A handle to one instance record; cheap to copy, only valid for the model
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance {
    pub id: u64,
    index: usize,
}

impl IfcModel {
    /// Read and index a file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let source = std::fs::read(path)?;
        let model = Self::from_bytes(source)?;
        tracing::debug!(
            path = %path.display(),
            records = model.records.len(),
            schema = model.schema().as_deref().unwrap_or("unknown"),
            "opened IFC model"
        );
        Ok(model)
    }

    pub fn from_bytes(source: Vec<u8>) -> Result<Self> {
        let scan = step::scan(&source)?;
        Ok(Self {
            source,
            header: scan.header,
            records: scan.records,
            edits: BTreeMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Schema identifier from the `FILE_SCHEMA` header entry, e.g. `IFC4`.
    pub fn schema(&self) -> Option<String> {
        let entry = self
            .header
            .iter()
            .find(|h| self.source[h.keyword.clone()].eq_ignore_ascii_case(b"FILE_SCHEMA"))?;
        let params = step::split_params(&self.source, entry.args.clone()).ok()?;
        let list = params.first()?;
        let raw = &self.source[list.clone()];
        let open = raw.iter().position(|&b| b == b'\'')?;
        let close = open + 1 + raw[open + 1..].iter().position(|&b| b == b'\'')?;
        encoding::decode(&raw[open + 1..close]).ok()
    }

    /// All instances whose keyword matches `entity` (case-insensitive),
    /// ordered by ascending id. Complex instances are never returned.
    pub fn by_type(&self, entity: &str) -> Vec<Instance> {
        let wanted = entity.as_bytes();
        let mut found: Vec<Instance> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_complex() && self.source[r.keyword.clone()].eq_ignore_ascii_case(wanted))
            .map(|(index, r)| Instance { id: r.id, index })
            .collect();
        found.sort_by_key(|i| i.id);
        found
    }

    /// First instance of `entity` by id, or `EntityNotFound`.
    pub fn first_of_type(&self, entity: &str) -> Result<Instance> {
        self.by_type(entity)
            .into_iter()
            .next()
            .ok_or_else(|| IfcError::EntityNotFound(entity.to_string()))
    }

    /// Keyword of an instance as written in the file (normally upper case).
    pub fn keyword(&self, inst: Instance) -> &str {
        let range = self.records[inst.index].keyword.clone();
        std::str::from_utf8(&self.source[range]).unwrap_or("")
    }

    fn attribute_span(&self, inst: Instance, index: usize) -> Result<Range<usize>> {
        let record = &self.records[inst.index];
        step::split_params(&self.source, record.args.clone())?
            .into_iter()
            .nth(index)
            .ok_or(IfcError::MissingAttribute { id: inst.id, index })
    }

    /// Raw text of an attribute, with any pending edit applied.
    pub fn raw_attribute(&self, inst: Instance, index: usize) -> Result<Vec<u8>> {
        let span = self.attribute_span(inst, index)?;
        match self.edits.get(&span.start) {
            Some((_, replacement)) => Ok(replacement.clone()),
            None => Ok(self.source[span].to_vec()),
        }
    }

    /// Read a string-valued attribute. `$` and `*` read as `None`; a typed
    /// wrapper such as `IFCLABEL('x')` is unwrapped.
    pub fn get_string(&self, inst: Instance, index: usize) -> Result<Option<String>> {
        let raw = self.raw_attribute(inst, index)?;
        let not_a_string = || IfcError::NotAString {
            id: inst.id,
            index,
            found: String::from_utf8_lossy(&raw).into_owned(),
        };

        match raw.as_slice() {
            b"$" | b"*" => Ok(None),
            [b'\'', body @ .., b'\''] => encoding::decode(body).map(Some),
            _ => {
                let open = raw.iter().position(|&b| b == b'(').ok_or_else(not_a_string)?;
                let inner = raw[open + 1..]
                    .strip_suffix(b")")
                    .map(|s| s.trim_ascii())
                    .ok_or_else(not_a_string)?;
                match inner {
                    [b'\'', body @ .., b'\''] => encoding::decode(body).map(Some),
                    _ => Err(not_a_string()),
                }
            }
        }
    }

    /// Replace a string-valued attribute. `None` writes `$`.
    pub fn set_string(&mut self, inst: Instance, index: usize, value: Option<&str>) -> Result<()> {
        let span = self.attribute_span(inst, index)?;
        let literal = match value {
            Some(v) => encoding::encode(v).into_bytes(),
            None => b"$".to_vec(),
        };
        tracing::trace!(id = inst.id, index, "attribute edit recorded");
        self.edits.insert(span.start, (span.end, literal));
        Ok(())
    }

    /// `Name` (attribute 2) of an `IfcRoot` subtype.
    pub fn name(&self, inst: Instance) -> Result<Option<String>> {
        self.get_string(inst, ROOT_NAME_INDEX)
    }

    pub fn set_name(&mut self, inst: Instance, value: &str) -> Result<()> {
        self.set_string(inst, ROOT_NAME_INDEX, Some(value))
    }

    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Stream the file with all edits applied.
    pub fn write_to(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        let mut pos = 0;
        for (&start, (end, replacement)) in &self.edits {
            out.write_all(&self.source[pos..start])?;
            out.write_all(replacement)?;
            pos = *end;
        }
        out.write_all(&self.source[pos..])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.source.len());
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    /// Atomically write the (edited) file to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        io::atomic_write_with(path, |w| self.write_to(w))?;
        tracing::debug!(path = %path.display(), edits = self.edits.len(), "wrote IFC model");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('house.ifc','2024-05-01T10:00:00',('Arquitecto'),('Estudio'),'IfcOpenShell','Exporter','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#20=IFCBUILDING('1xS3BCk291UvhgP2dvNsgp',$,'Second',$,$,$,$,$,.ELEMENT.,$,$,$);
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Casa Modelo',$,$,$,$,(#5),#6);
#2=IFCSITE('2p0qzZrRT5fhJ6RTwyO4qZ',$, $ ,$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#3=IFCBUILDING('3cUkl32yn9qRSPvBJVyWYp',$,IFCLABEL('Bloque \\X2\\00C1\\X0\\'),$,$,$,$,$,.ELEMENT.,$,$,$);
#4=IFCWALL('1',$,'Wall',$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
";

    fn model() -> IfcModel {
        IfcModel::from_bytes(MODEL.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn schema_comes_from_header() {
        assert_eq!(model().schema().as_deref(), Some("IFC2X3"));
    }

    #[test]
    fn by_type_is_case_insensitive_and_ordered_by_id() {
        let m = model();
        let ids: Vec<u64> = m.by_type("IfcBuilding").iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 20]);
        assert_eq!(m.by_type("IFCWALL").len(), 1);
        assert!(m.by_type("IfcDoor").is_empty());
    }

    #[test]
    fn first_of_type_reports_missing_entity() {
        let err = model().first_of_type("IfcDoor").unwrap_err();
        assert!(matches!(err, IfcError::EntityNotFound(ref e) if e == "IfcDoor"));
    }

    #[test]
    fn name_reads_plain_null_and_typed_values() {
        let m = model();
        let project = m.first_of_type("IfcProject").unwrap();
        let site = m.first_of_type("IfcSite").unwrap();
        let building = m.first_of_type("IfcBuilding").unwrap();
        assert_eq!(m.name(project).unwrap().as_deref(), Some("Casa Modelo"));
        assert_eq!(m.name(site).unwrap(), None);
        assert_eq!(m.name(building).unwrap().as_deref(), Some("Bloque Á"));
    }

    #[test]
    fn get_string_rejects_non_string_attribute() {
        let m = model();
        let project = m.first_of_type("IfcProject").unwrap();
        let err = m.get_string(project, 7).unwrap_err();
        assert!(matches!(err, IfcError::NotAString { id: 1, index: 7, .. }));
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let m = model();
        let wall = m.first_of_type("IfcWall").unwrap();
        assert!(matches!(
            m.get_string(wall, 40).unwrap_err(),
            IfcError::MissingAttribute { id: 4, index: 40 }
        ));
    }

    #[test]
    fn set_name_is_visible_to_reads() {
        let mut m = model();
        let site = m.first_of_type("IfcSite").unwrap();
        m.set_name(site, "Parcela Ñ").unwrap();
        assert_eq!(m.name(site).unwrap().as_deref(), Some("Parcela Ñ"));
        assert!(m.has_edits());
    }

    #[test]
    fn edits_only_touch_the_attribute_span() {
        let mut m = model();
        let project = m.first_of_type("IfcProject").unwrap();
        m.set_name(project, "Nuevo").unwrap();
        let out = String::from_utf8(m.to_bytes()).unwrap();
        assert_eq!(out, MODEL.replace("'Casa Modelo'", "'Nuevo'"));
    }

    #[test]
    fn edit_replaces_null_and_keeps_surrounding_whitespace() {
        let mut m = model();
        let site = m.first_of_type("IfcSite").unwrap();
        m.set_name(site, "S").unwrap();
        let out = String::from_utf8(m.to_bytes()).unwrap();
        assert!(out.contains("#2=IFCSITE('2p0qzZrRT5fhJ6RTwyO4qZ',$, 'S' ,$"));
    }

    #[test]
    fn repeated_set_keeps_last_value() {
        let mut m = model();
        let project = m.first_of_type("IfcProject").unwrap();
        m.set_name(project, "One").unwrap();
        m.set_name(project, "Two").unwrap();
        let reopened = IfcModel::from_bytes(m.to_bytes()).unwrap();
        let project = reopened.first_of_type("IfcProject").unwrap();
        assert_eq!(reopened.name(project).unwrap().as_deref(), Some("Two"));
    }

    #[test]
    fn unedited_model_writes_identical_bytes() {
        assert_eq!(model().to_bytes(), MODEL.as_bytes());
    }

    #[test]
    fn write_and_open_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/house.ifc");
        let mut m = model();
        let building = m.first_of_type("IfcBuilding").unwrap();
        m.set_name(building, "Torre").unwrap();
        m.write(&path).unwrap();

        let reopened = IfcModel::open(&path).unwrap();
        let building = reopened.first_of_type("IfcBuilding").unwrap();
        assert_eq!(building.id, 3);
        assert_eq!(reopened.name(building).unwrap().as_deref(), Some("Torre"));
        assert_eq!(reopened.keyword(building), "IFCBUILDING");
        assert_eq!(reopened.len(), 5);
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = IfcModel::open(&dir.path().join("nope.ifc")).unwrap_err();
        assert!(matches!(err, IfcError::Io(_)));
    }
}
