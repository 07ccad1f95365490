use std::io::Write;

use datagen_core::{FeatureRef, Instance};

use crate::export::{ExportError, ExportSequence, ExportSink};

const ID_COLUMN: &str = "ID";

/// CSV export sink.
///
/// Lines end with a single `\n`. With `export_feature_names` the metadata
/// call writes a header of feature names, prefixed by `ID` when
/// `export_instance_ids` is set; instance lines then start with the id.
pub struct CsvExportSink<W: Write> {
    writer: Option<csv::Writer<CountingWriter<W>>>,
    export_feature_names: bool,
    export_instance_ids: bool,
    sequence: ExportSequence,
    bytes_written: u64,
}

impl<W: Write> CsvExportSink<W> {
    pub fn new(inner: W, export_feature_names: bool, export_instance_ids: bool) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(CountingWriter::new(inner));
        Self {
            writer: Some(writer),
            export_feature_names,
            export_instance_ids,
            sequence: ExportSequence::default(),
            bytes_written: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<CountingWriter<W>>, ExportError> {
        self.writer.as_mut().ok_or(ExportError::Closed)
    }
}

impl<W: Write + Send> ExportSink for CsvExportSink<W> {
    fn export_metadata(&mut self, definitions: &[FeatureRef]) -> Result<(), ExportError> {
        self.sequence.check_metadata()?;

        if self.export_feature_names {
            let mut header: Vec<&str> = Vec::with_capacity(definitions.len() + 1);
            if self.export_instance_ids {
                header.push(ID_COLUMN);
            }
            header.extend(definitions.iter().map(|definition| definition.name()));
            self.writer()?.write_record(&header)?;
        }

        self.sequence.mark_metadata();
        Ok(())
    }

    fn export_instance(&mut self, instance: &Instance) -> Result<(), ExportError> {
        self.sequence.check_instance()?;

        let mut record: Vec<String> = Vec::with_capacity(instance.len() + 1);
        if self.export_instance_ids {
            record.push(instance.id().to_string());
        }
        record.extend(instance.iter().map(|value| value.render()));
        self.writer()?.write_record(&record)?;

        self.sequence.mark_instance();
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        if !self.sequence.mark_closed() {
            return Ok(());
        }
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        let mut counting = writer.into_inner().map_err(|err| err.into_error())?;
        counting.flush()?;
        self.bytes_written = counting.bytes_written();
        Ok(())
    }

    fn bytes_written(&self) -> Option<u64> {
        match &self.writer {
            Some(writer) => Some(writer.get_ref().bytes_written()),
            None => Some(self.bytes_written),
        }
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use datagen_core::{
        Distribution, DummyDistribution, FeatureDefinition, FeatureValue, SequencingError,
    };

    use super::*;

    fn dummy(name: &str) -> FeatureRef {
        FeatureDefinition::new(name, Distribution::Dummy(DummyDistribution::new()))
            .expect("definition")
    }

    fn one_feature() -> Instance {
        Instance::new(0, vec![FeatureValue::Discrete(0)])
    }

    fn two_features() -> Instance {
        Instance::new(0, vec![FeatureValue::Discrete(0), FeatureValue::Discrete(1)])
    }

    fn export(
        names: bool,
        ids: bool,
        run: impl FnOnce(&mut CsvExportSink<&mut Vec<u8>>),
    ) -> String {
        let mut out = Vec::new();
        {
            let mut sink = CsvExportSink::new(&mut out, names, ids);
            run(&mut sink);
            sink.close().expect("close");
        }
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn one_instance_one_feature() {
        let out = export(false, false, |sink| {
            sink.export_instance(&one_feature()).expect("export");
        });
        assert_eq!(out, "0\n");
    }

    #[test]
    fn two_instances_two_features() {
        let out = export(false, false, |sink| {
            sink.export_instance(&two_features()).expect("export");
            sink.export_instance(&two_features()).expect("export");
        });
        assert_eq!(out, "0,1\n0,1\n");
    }

    #[test]
    fn continuous_values_use_double_rendering() {
        let out = export(false, false, |sink| {
            let instance = Instance::new(
                0,
                vec![
                    FeatureValue::Continuous(177.8),
                    FeatureValue::Continuous(-9.0),
                    FeatureValue::Continuous(5.423432423523535e-14),
                ],
            );
            sink.export_instance(&instance).expect("export");
        });
        assert_eq!(out, "177.8,-9.0,5.423432423523535E-14\n");
    }

    #[test]
    fn export_after_close_fails() {
        let mut out = Vec::new();
        let mut sink = CsvExportSink::new(&mut out, false, false);
        sink.close().expect("close");
        sink.close().expect("close is idempotent");
        let err = sink.export_instance(&one_feature()).expect_err("closed");
        assert!(matches!(err, ExportError::Closed));
    }

    #[test]
    fn metadata_writes_feature_names() {
        let out = export(true, false, |sink| {
            sink.export_metadata(&[dummy("usheight"), dummy("uswidth")])
                .expect("metadata");
        });
        assert_eq!(out, "usheight,uswidth\n");
    }

    #[test]
    fn metadata_without_feature_names_writes_nothing() {
        let out = export(false, false, |sink| {
            sink.export_metadata(&[dummy("usheight")]).expect("metadata");
        });
        assert!(out.is_empty());
    }

    #[test]
    fn instance_ids_prefix_every_line() {
        let out = export(false, true, |sink| {
            sink.export_metadata(&[dummy("test")]).expect("metadata");
            sink.export_instance(&two_features()).expect("export");
            sink.export_instance(&Instance::new(1, vec![FeatureValue::Discrete(1)]))
                .expect("export");
        });
        assert_eq!(out, "0,0,1\n1,1\n");
    }

    #[test]
    fn instance_ids_with_feature_names_add_id_header() {
        let out = export(true, true, |sink| {
            sink.export_metadata(&[dummy("test")]).expect("metadata");
            sink.export_instance(&two_features()).expect("export");
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["ID,test", "0,0,1"]);
    }

    #[test]
    fn metadata_is_not_callable_twice() {
        let mut out = Vec::new();
        let mut sink = CsvExportSink::new(&mut out, true, false);
        sink.export_metadata(&[dummy("usheight")]).expect("metadata");
        let err = sink
            .export_metadata(&[dummy("usheight")])
            .expect_err("second call");
        assert!(matches!(
            err,
            ExportError::Sequencing(SequencingError::MethodNotCallableTwice)
        ));
    }

    #[test]
    fn metadata_after_instance_fails_without_writing() {
        let out = export(true, false, |sink| {
            sink.export_instance(&one_feature()).expect("export");
            let err = sink
                .export_metadata(&[dummy("usheight")])
                .expect_err("out of order");
            assert!(matches!(
                err,
                ExportError::Sequencing(SequencingError::MetadataAfterInstances)
            ));
        });
        assert_eq!(out, "0\n");
    }

    #[test]
    fn bytes_written_reported_after_close() {
        let mut out = Vec::new();
        let mut sink = CsvExportSink::new(&mut out, false, false);
        sink.export_instance(&two_features()).expect("export");
        sink.close().expect("close");
        assert_eq!(sink.bytes_written(), Some(4));
    }
}
