use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::discretization::mesh::Mesh;
use crate::ib::ImmersedBoundarySet;

/// Append-only CSV time series of force and centroid trajectory, one file
/// per body.
pub struct BodyHistoryWriter {
    files: Vec<(String, BufWriter<File>)>,
}

impl BodyHistoryWriter {
    pub fn create(dir: impl AsRef<Path>, ib: &ImmersedBoundarySet) -> io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut files = Vec::with_capacity(ib.objects.len());
        for obj in &ib.objects {
            let path: PathBuf = dir.join(format!("{}.csv", obj.name));
            let mut file = BufWriter::new(File::create(path)?);
            writeln!(file, "t,fx,fy,f,torque,x,y")?;
            files.push((obj.name.clone(), file));
        }
        Ok(Self { files })
    }

    pub fn append(&mut self, t: f64, ib: &ImmersedBoundarySet) -> io::Result<()> {
        for (obj, (_, file)) in ib.objects.iter().zip(&mut self.files) {
            let c = obj.shape.centroid();
            writeln!(
                file,
                "{t:.9e},{:.9e},{:.9e},{:.9e},{:.9e},{:.9e},{:.9e}",
                obj.force.x,
                obj.force.y,
                obj.force.length(),
                obj.torque,
                c.x,
                c.y
            )?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for (_, file) in &mut self.files {
            file.flush()?;
        }
        Ok(())
    }
}

/// Snapshot of the classification field: cell id, centroid, status code.
pub fn write_cell_status(
    path: impl AsRef<Path>,
    mesh: &Mesh,
    status: &[i32],
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "cell,x,y,status")?;
    for cell in &mesh.cells {
        writeln!(
            file,
            "{},{:.9e},{:.9e},{}",
            cell.id, cell.centroid.x, cell.centroid.y, status[cell.id]
        )?;
    }
    Ok(())
}

/// One scalar column over the cells, with centroids for plotting.
pub fn write_scalar_field(
    path: impl AsRef<Path>,
    mesh: &Mesh,
    header: &str,
    values: &[f64],
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "cell,x,y,{header}")?;
    for cell in &mesh.cells {
        writeln!(
            file,
            "{},{:.9e},{:.9e},{:.15e}",
            cell.id, cell.centroid.x, cell.centroid.y, values[cell.id]
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::rectilinear_mesh;

    #[test]
    fn cell_status_snapshot_has_one_row_per_cell() {
        let mesh = rectilinear_mesh(3, 3, 1.0, 1.0);
        let status = vec![1; mesh.n_cells()];
        let dir = std::env::temp_dir().join("ibfvm_writer_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("status.csv");

        write_cell_status(&path, &mesh, &status).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert!(content.starts_with("cell,x,y,status"));

        std::fs::remove_file(&path).ok();
    }
}
