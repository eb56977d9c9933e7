use crate::dicom::Slice;
use crate::study::{LoadReport, StudyDescriptor};

pub fn print_study(descriptor: &StudyDescriptor, report: &LoadReport) {
    print_field("Study ID", Some(&descriptor.study_id));
    print_field("Patient Name", descriptor.patient_name.as_ref());
    print_field("Patient Age", descriptor.patient_age.as_ref());
    print_field("Patient Gender", descriptor.patient_gender.as_ref());
    print_field("Modality", descriptor.modality.as_ref());
    print_field("Status", descriptor.status.as_ref());
    print_field("Notes", descriptor.notes.as_ref());
    println!("{:20}: {}", "Files", report);

    for failure in &report.failures {
        println!("{:20}: #{} {} ({})", "Skipped", failure.index + 1, failure.file_id, failure.cause);
    }
    println!();
}

pub fn print_metadata(slice: &Slice) {
    let metadata = slice.metadata();

    print_field("Patient Name", metadata.patient.name.as_ref());
    print_field("Patient ID", metadata.patient.id.as_ref());

    print_field("Study Date", metadata.study.date.as_ref());
    print_field("Study Description", metadata.study.description.as_ref());
    print_field("Modality", metadata.study.modality.as_ref());

    print_field("Series Description", metadata.series.description.as_ref());
    if let Some(instance) = metadata.series.instance_number {
        println!("{:20}: {}", "Instance Number", instance);
    }

    println!(
        "{:20}: {} [{} spp, {} frames, {}]",
        "Dimensions",
        slice.dimensions(),
        metadata.samples_per_pixel,
        metadata.number_of_frames,
        metadata.photometric_interpretation
    );
    println!("{:20}: {}", "Bit Depth", slice.bit_depth());

    let window = slice.native_window();
    let origin = if window.from_file { "file" } else { "default" };
    println!("{:20}: {}/{} ({origin})", "Window W/C", window.width, window.center);
    println!("{:20}: {}", "Rescale", metadata.rescale);
    println!("{:20}: {}", "Pixel Spacing", metadata.pixel_spacing);
    println!("{:20}: {}", "Slice Location", metadata.series.slice_location);
    println!("{:20}: {}", "Slice Thickness", metadata.series.slice_thickness);

    if let Some(sop_class) = &metadata.sop_class {
        println!("{:20}: {}", "SOP Class UID", sop_class);
    }
    println!("{:20}: {}", "Transfer Syntax", metadata.transfer_syntax);

    println!();
}

fn print_field(name: &str, value: Option<&String>) {
    if let Some(v) = value {
        println!("{name:20}: {v}");
    }
}
