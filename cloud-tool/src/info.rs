use crate::{io::load_record, opts::Info};
use cloud_format::PointCloudMessage;
use eyre::Result;
use itertools::Itertools;

pub fn info(args: Info) -> Result<()> {
    let Info { file } = args;
    let msg = load_record(&file)?;
    print!("{}", describe(&msg));
    Ok(())
}

fn describe(msg: &PointCloudMessage) -> String {
    let PointCloudMessage {
        ref header,
        height,
        width,
        ref fields,
        is_bigendian,
        point_step,
        row_step,
        ref data,
        is_dense,
        num_echoes,
        segment_idx,
    } = *msg;

    let mut text = format!(
        "seq\t{}\n\
         stamp\t{}.{:09}\n\
         frame_id\t{}\n\
         size\t{width} x {height} ({} points)\n\
         point_step\t{point_step}\n\
         row_step\t{row_step}\n\
         data\t{} bytes\n\
         bigendian\t{is_bigendian}\n\
         dense\t{is_dense}\n\
         echoes\t{num_echoes}\n\
         segment\t{segment_idx}\n\n",
        header.seq,
        header.timestamp_sec,
        header.timestamp_nsec,
        String::from_utf8_lossy(&header.frame_id),
        msg.num_points(),
        data.len(),
    );

    text.push_str("name\ttype\tcount\toffset\n");
    let rows = fields
        .iter()
        .map(|field| {
            format!(
                "{}\t{:?}\t{}\t{}\n",
                field.name, field.datatype, field.count, field.offset
            )
        })
        .join("");
    text.push_str(&rows);
    text
}
